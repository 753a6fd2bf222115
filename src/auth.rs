//! Authentication
//!
//! Providers receive credentials only through [`Authentication::headers`].
//! Keys are held as [`secrecy::SecretString`] and header values are marked
//! sensitive so they never appear in debug output or logs.

use crate::error::{OmniError, Result};
use crate::types::Provider;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Produces the headers that authenticate one request.
pub trait Authentication: Send + Sync + fmt::Debug {
    fn headers(&self) -> Result<HeaderMap>;
}

/// API key sent as `{header}: {prefix}{key}`.
#[derive(Clone)]
pub struct ApiKey {
    key: SecretString,
    header: &'static str,
    prefix: &'static str,
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("header", &self.header)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl ApiKey {
    pub fn new(key: SecretString, header: &'static str, prefix: &'static str) -> Self {
        Self {
            key,
            header,
            prefix,
        }
    }

    pub fn bearer(key: SecretString) -> Self {
        Self::new(key, "authorization", "Bearer ")
    }

    /// Header layout each provider expects.
    pub fn for_provider(provider: Provider, key: SecretString) -> Self {
        match provider {
            Provider::Anthropic | Provider::Gradium => Self::new(key, "x-api-key", ""),
            Provider::Google => Self::new(key, "x-goog-api-key", ""),
            Provider::ElevenLabs => Self::new(key, "xi-api-key", ""),
            Provider::Bfl => Self::new(key, "x-key", ""),
            _ => Self::bearer(key),
        }
    }

    pub fn header_name(&self) -> &'static str {
        self.header
    }
}

impl Authentication for ApiKey {
    fn headers(&self) -> Result<HeaderMap> {
        let name = HeaderName::from_static(self.header);
        let mut value = HeaderValue::from_str(&format!("{}{}", self.prefix, self.key.expose_secret()))
            .map_err(|_| OmniError::Configuration(format!("Invalid characters in {} credential", self.header)))?;
        value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(name, value);
        Ok(headers)
    }
}

/// No credentials, for local providers such as Ollama.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl Authentication for NoAuth {
    fn headers(&self) -> Result<HeaderMap> {
        Ok(HeaderMap::new())
    }
}

/// Another authentication plus fixed, non-secret headers such as API versions.
#[derive(Debug)]
pub struct WithHeaders<'a> {
    inner: &'a dyn Authentication,
    extra: HeaderMap,
}

impl<'a> WithHeaders<'a> {
    pub fn new(inner: &'a dyn Authentication, extra: HeaderMap) -> Self {
        Self { inner, extra }
    }
}

impl Authentication for WithHeaders<'_> {
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = self.extra.clone();
        headers.extend(self.inner.headers()?);
        Ok(headers)
    }
}

/// Headers resolved once from another authentication, owned so they can
/// move into a background stream.
#[derive(Clone)]
pub struct ResolvedHeaders(HeaderMap);

impl ResolvedHeaders {
    pub fn capture(auth: &dyn Authentication) -> Result<Self> {
        auth.headers().map(Self)
    }
}

impl fmt::Debug for ResolvedHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResolvedHeaders").field(&self.0.len()).finish()
    }
}

impl Authentication for ResolvedHeaders {
    fn headers(&self) -> Result<HeaderMap> {
        Ok(self.0.clone())
    }
}

/// Environment variable holding the API key for `provider`.
pub fn env_var(provider: Provider) -> Option<&'static str> {
    match provider {
        Provider::OpenAI => Some("OPENAI_API_KEY"),
        Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
        Provider::Google => Some("GOOGLE_API_KEY"),
        Provider::Mistral => Some("MISTRAL_API_KEY"),
        Provider::Cohere => Some("COHERE_API_KEY"),
        Provider::XAi => Some("XAI_API_KEY"),
        Provider::DeepSeek => Some("DEEPSEEK_API_KEY"),
        Provider::BytePlus => Some("BYTEPLUS_API_KEY"),
        Provider::Bfl => Some("BFL_API_KEY"),
        Provider::ElevenLabs => Some("ELEVENLABS_API_KEY"),
        Provider::Gradium => Some("GRADIUM_API_KEY"),
        Provider::Mureka => Some("MUREKA_API_KEY"),
        Provider::Groq => Some("GROQ_API_KEY"),
        Provider::Moonshot => Some("MOONSHOT_API_KEY"),
        Provider::HuggingFace => Some("HUGGINGFACE_TOKEN"),
        Provider::Ollama => None,
    }
}

/// API keys for all providers.
#[derive(Clone, Default)]
pub struct Credentials {
    keys: HashMap<Provider, SecretString>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut configured: Vec<&Provider> = self.keys.keys().collect();
        configured.sort();
        f.debug_struct("Credentials")
            .field("configured", &configured)
            .finish()
    }
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every provider key present in the environment.
    pub fn from_env() -> Self {
        let mut credentials = Self::new();
        for provider in Provider::ALL {
            if let Some(var) = env_var(provider)
                && let Ok(value) = std::env::var(var)
                && !value.trim().is_empty()
            {
                credentials
                    .keys
                    .insert(provider, SecretString::from(value.trim().to_string()));
            }
        }
        credentials
    }

    pub fn with_key(mut self, provider: Provider, key: impl Into<String>) -> Self {
        self.keys.insert(provider, SecretString::from(key.into()));
        self
    }

    pub fn has(&self, provider: Provider) -> bool {
        env_var(provider).is_none() || self.keys.contains_key(&provider)
    }

    /// Authentication for `provider`, or `MissingCredentials`.
    pub fn auth_for(&self, provider: Provider) -> Result<Arc<dyn Authentication>> {
        if env_var(provider).is_none() {
            return Ok(Arc::new(NoAuth));
        }
        let key = self
            .keys
            .get(&provider)
            .cloned()
            .ok_or(OmniError::MissingCredentials { provider })?;
        Ok(Arc::new(ApiKey::for_provider(provider, key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_header_layouts() {
        let h = ApiKey::for_provider(Provider::OpenAI, "sk-1".to_string().into())
            .headers()
            .unwrap();
        assert_eq!(h["authorization"], "Bearer sk-1");
        assert!(h["authorization"].is_sensitive());

        let h = ApiKey::for_provider(Provider::ElevenLabs, "el".to_string().into())
            .headers()
            .unwrap();
        assert_eq!(h["xi-api-key"], "el");

        let h = ApiKey::for_provider(Provider::Bfl, "b".to_string().into())
            .headers()
            .unwrap();
        assert_eq!(h["x-key"], "b");
    }

    #[test]
    fn missing_key_is_reported_per_provider() {
        let creds = Credentials::new().with_key(Provider::Anthropic, "k");
        assert!(creds.auth_for(Provider::Anthropic).is_ok());
        let err = creds.auth_for(Provider::Mureka).unwrap_err();
        assert!(matches!(
            err,
            OmniError::MissingCredentials {
                provider: Provider::Mureka
            }
        ));
        assert!(creds.auth_for(Provider::Ollama).unwrap().headers().unwrap().is_empty());
    }

    #[test]
    fn debug_output_redacts_keys() {
        let creds = Credentials::new().with_key(Provider::OpenAI, "sk-secret");
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("sk-secret"));
        let key = ApiKey::bearer("sk-secret".to_string().into());
        assert!(!format!("{key:?}").contains("sk-secret"));
    }
}
