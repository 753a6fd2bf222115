//! Client facade
//!
//! [`Omnigen`] owns the registry, credentials and transport configuration and
//! hands out [`Client`]s bound to one model and capability. A client builds
//! requests synchronously (mappers and constraints, no I/O), then either
//! sends them and parses the complete response or opens a [`ChunkStream`].
//!
//! ```rust,ignore
//! use omnigen::{Capability, Input, Omnigen, Param, Parameters};
//!
//! let omni = Omnigen::from_env()?;
//! let client = omni.create_client(Capability::TextGeneration, "gpt-4o", None)?;
//! let output = client
//!     .generate(&Input::text("Name a moon of Mars"), &Parameters::new().with(Param::Temperature, 0.2))
//!     .await?;
//! println!("{}", output.text().unwrap_or_default());
//! ```

use crate::auth::{Authentication, Credentials};
use crate::config::ClientConfig;
use crate::error::{OmniError, Result};
use crate::params::{RequestBody, apply_mappers, resolve_artifacts, transform_output};
use crate::providers::{ProviderAdapter, RequestContext};
use crate::registry::{Model, Registry};
use crate::streaming::ChunkStream;
use crate::transport::HttpTransport;
use crate::types::{Capability, Content, Input, MimeType, Output, Parameters, Provider};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// A model bound to the adapter that serves one of its capabilities.
#[derive(Clone)]
pub struct Client {
    model: Model,
    capability: Capability,
    adapter: Arc<dyn ProviderAdapter>,
    transport: HttpTransport,
    auth: Arc<dyn Authentication>,
    config: Arc<ClientConfig>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("model", &self.model.id)
            .field("provider", &self.model.provider)
            .field("capability", &self.capability)
            .finish()
    }
}

impl Client {
    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn provider(&self) -> Provider {
        self.model.provider
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    fn context(&self) -> RequestContext<'_> {
        RequestContext {
            model: &self.model,
            transport: &self.transport,
            auth: self.auth.as_ref(),
            config: &self.config,
        }
    }

    /// Build the provider request body for `input` and `params`.
    ///
    /// Runs every mapper in order, validating each supplied value against the
    /// model's constraints. Fails on the first violation.
    pub fn build_request(&self, input: &Input, params: &Parameters, streaming: bool) -> Result<RequestBody> {
        let mut request = self.adapter.init_request(input, &self.model, streaming)?;
        apply_mappers(&mut request, self.adapter.mappers_for(&self.model), params, &self.model)?;
        self.adapter.finalize_request(&mut request, params, &self.model)?;
        Ok(request)
    }

    /// Send one complete request and parse the response.
    pub async fn generate(&self, input: &Input, params: &Parameters) -> Result<Output> {
        let mut params = params.clone();
        resolve_artifacts(&mut params).await?;
        let request = self.build_request(input, &params, false)?;

        let span = tracing::info_span!("generate", request_id = %Uuid::new_v4());
        tracing::info!(
            parent: &span,
            provider = %self.model.provider,
            model = %self.model.id,
            capability = %self.capability,
            "generate"
        );
        let response = self.adapter.send(&self.context(), request).instrument(span).await?;

        let extractor = self.adapter.extractor_for(&self.model, &params);
        let content = extractor.parse_content(&response)?;
        let content = transform_output(content, self.adapter.mappers_for(&self.model), &params)?;
        let mut metadata = extractor.build_metadata(&response);
        metadata.insert("model".into(), Value::String(self.model.id.clone()));
        metadata.insert(
            "provider".into(),
            Value::String(self.model.provider.as_str().to_string()),
        );
        Ok(Output {
            content,
            usage: extractor.parse_usage(&response),
            finish_reason: extractor.parse_finish_reason(&response),
            metadata,
        })
    }

    /// Open a streamed request.
    ///
    /// Fails with [`OmniError::StreamingNotSupported`] before any other work
    /// when the model does not stream.
    pub async fn stream(&self, input: &Input, params: &Parameters) -> Result<ChunkStream> {
        let unsupported = || OmniError::StreamingNotSupported {
            model_id: self.model.id.clone(),
        };
        if !self.model.streaming {
            return Err(unsupported());
        }
        let parser = self.adapter.chunk_parser().ok_or_else(unsupported)?;

        let mut params = params.clone();
        resolve_artifacts(&mut params).await?;
        let request = self.build_request(input, &params, true)?;

        let span = tracing::info_span!("stream", request_id = %Uuid::new_v4());
        tracing::info!(
            parent: &span,
            provider = %self.model.provider,
            model = %self.model.id,
            capability = %self.capability,
            "stream"
        );
        let source = self.adapter.open_stream(&self.context(), request).instrument(span).await?;

        let adapter = self.adapter.clone();
        let model = self.model.clone();
        let mime = adapter.output_mime(&params);
        Ok(ChunkStream::new(source, parser, self.capability)
            .for_model(&self.model.id, self.model.provider)
            .with_output_transform(move |content| {
                transform_output(with_audio_mime(content, mime), adapter.mappers_for(&model), &params)
            }))
    }
}

/// Stamp the requested audio MIME type on assembled audio content.
fn with_audio_mime(content: Content, mime: Option<MimeType>) -> Content {
    match (content, mime) {
        (Content::Audio(artifact), Some(mime)) => Content::Audio(artifact.with_mime_type(mime)),
        (content, _) => content,
    }
}

/// Registry, credentials and transport settings shared by every client.
#[derive(Clone)]
pub struct Omnigen {
    registry: Arc<Registry>,
    credentials: Credentials,
    config: Arc<ClientConfig>,
    transport: HttpTransport,
}

impl fmt::Debug for Omnigen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Omnigen")
            .field("registry", &self.registry)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl Omnigen {
    pub fn builder() -> OmnigenBuilder {
        OmnigenBuilder::default()
    }

    /// Built-in providers, keys from the environment and default settings.
    pub fn from_env() -> Result<Self> {
        Self::builder().credentials(Credentials::from_env()).build()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A client for `model_id` serving `capability`.
    ///
    /// Without `provider` the first registered model with that id is used.
    pub fn create_client(
        &self,
        capability: Capability,
        model_id: &str,
        provider: Option<Provider>,
    ) -> Result<Client> {
        let model = self.registry.require_model(model_id, provider)?;
        if !model.has_capability(capability) {
            return Err(OmniError::UnsupportedCapability {
                model_id: model.id.clone(),
                capability,
            });
        }
        let adapter = self.registry.adapter(capability, model.provider)?;
        let auth = self.credentials.auth_for(model.provider)?;
        tracing::debug!(provider = %model.provider, model = %model.id, %capability, "client created");
        Ok(Client {
            model: model.clone(),
            capability,
            adapter,
            transport: self.transport.clone(),
            auth,
            config: self.config.clone(),
        })
    }

    /// Account endpoints of Mureka: lyrics, song description, stems, billing.
    #[cfg(feature = "mureka")]
    pub fn mureka_account(&self) -> Result<crate::providers::mureka::MurekaAccount> {
        let auth = self.credentials.auth_for(Provider::Mureka)?;
        crate::providers::mureka::MurekaAccount::new(&self.config, auth)
    }
}

#[derive(Debug, Default)]
pub struct OmnigenBuilder {
    registry: Option<Arc<Registry>>,
    credentials: Option<Credentials>,
    config: Option<ClientConfig>,
}

impl OmnigenBuilder {
    /// Use this registry instead of the built-in catalog.
    pub fn registry(mut self, registry: impl Into<Arc<Registry>>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Omnigen> {
        let registry = match self.registry {
            Some(registry) => registry,
            None => Arc::new(Registry::with_builtin()?),
        };
        let config = self.config.unwrap_or_default();
        let transport = HttpTransport::new(&config)?;
        Ok(Omnigen {
            registry,
            credentials: self.credentials.unwrap_or_default(),
            config: Arc::new(config),
            transport,
        })
    }
}
