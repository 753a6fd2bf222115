//! HTTP transport
//!
//! A thin wrapper over a shared `reqwest::Client`. Every request carries the
//! configured extra headers plus the provider's authentication headers;
//! unsuccessful statuses are classified into [`OmniError::Api`] before any
//! body parsing happens.

use crate::auth::Authentication;
use crate::config::ClientConfig;
use crate::error::{OmniError, Result, classify_http_error};
use crate::params::RequestBody;
use crate::protocols::RawResponse;
use crate::streaming::ndjson::{last_ndjson_value, stream_ndjson_values};
use crate::streaming::sse::{SseJsonStreamConfig, stream_sse_json_values};
use crate::streaming::{EventSource, WireEvent};
use crate::types::Provider;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| OmniError::Configuration(format!("Invalid header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| OmniError::Configuration(format!("Invalid value for header '{key}': {e}")))?;
            headers.insert(name, value);
        }
        Ok(Self {
            client: config.build_http_client()?,
            headers,
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Configured extra headers merged with `auth`; auth wins on conflict.
    pub fn headers(&self, auth: &dyn Authentication) -> Result<HeaderMap> {
        let mut headers = self.headers.clone();
        headers.extend(auth.headers()?);
        Ok(headers)
    }

    fn request(&self, method: Method, url: &str, auth: &dyn Authentication) -> Result<RequestBuilder> {
        Ok(self.client.request(method, url).headers(self.headers(auth)?))
    }

    async fn send(&self, provider: Provider, builder: RequestBuilder, url: &str) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            tracing::debug!(%provider, url, error = %e, "request failed");
            OmniError::from(e)
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        let err = classify_http_error(provider, status.as_u16(), &body, &headers);
        tracing::debug!(%provider, url, status = status.as_u16(), error = %err, "request rejected");
        Err(err)
    }

    async fn read_json(response: Response) -> Result<Value> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            let sample: String = text.chars().take(200).collect();
            OmniError::parse(format!("Invalid JSON response: {e}: {sample}"))
        })
    }

    pub async fn post_json(
        &self,
        provider: Provider,
        url: &str,
        auth: &dyn Authentication,
        body: &RequestBody,
    ) -> Result<Value> {
        tracing::debug!(%provider, url, "POST");
        let builder = self.request(Method::POST, url, auth)?.json(body);
        let response = self.send(provider, builder, url).await?;
        Self::read_json(response).await
    }

    pub async fn get_json(&self, provider: Provider, url: &str, auth: &dyn Authentication) -> Result<Value> {
        tracing::debug!(%provider, url, "GET");
        let builder = self.request(Method::GET, url, auth)?;
        let response = self.send(provider, builder, url).await?;
        Self::read_json(response).await
    }

    /// GET a binary body, such as a finished video download.
    pub async fn get_binary(&self, provider: Provider, url: &str, auth: &dyn Authentication) -> Result<RawResponse> {
        tracing::debug!(%provider, url, "GET (binary response)");
        let builder = self.request(Method::GET, url, auth)?;
        let response = self.send(provider, builder, url).await?;
        Self::read_binary(response).await
    }

    async fn read_binary(response: Response) -> Result<RawResponse> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let data = response.bytes().await?;
        Ok(RawResponse::Binary { data, content_type })
    }

    /// POST JSON and return the raw body bytes with their content type.
    pub async fn post_binary(
        &self,
        provider: Provider,
        url: &str,
        auth: &dyn Authentication,
        body: &RequestBody,
    ) -> Result<RawResponse> {
        tracing::debug!(%provider, url, "POST (binary response)");
        let builder = self.request(Method::POST, url, auth)?.json(body);
        let response = self.send(provider, builder, url).await?;
        Self::read_binary(response).await
    }

    /// POST JSON and decode the SSE response body into JSON events.
    pub async fn post_sse(
        &self,
        provider: Provider,
        url: &str,
        auth: &dyn Authentication,
        body: &RequestBody,
    ) -> Result<EventSource> {
        tracing::debug!(%provider, url, "POST (sse)");
        let builder = self
            .request(Method::POST, url, auth)?
            .header(ACCEPT, "text/event-stream")
            .json(body);
        let response = self.send(provider, builder, url).await?;
        let events = stream_sse_json_values(
            Box::pin(response.bytes_stream()),
            SseJsonStreamConfig::new(provider.as_str()),
        );
        Ok(EventSource::new(events))
    }

    /// POST JSON and decode the NDJSON response body line by line.
    pub async fn post_ndjson(
        &self,
        provider: Provider,
        url: &str,
        auth: &dyn Authentication,
        body: &RequestBody,
    ) -> Result<EventSource> {
        tracing::debug!(%provider, url, "POST (ndjson)");
        let builder = self.request(Method::POST, url, auth)?.json(body);
        let response = self.send(provider, builder, url).await?;
        Ok(EventSource::new(stream_ndjson_values(
            Box::pin(response.bytes_stream()),
            provider.as_str(),
        )))
    }

    /// POST JSON and read a complete NDJSON body, returning its last line.
    pub async fn post_ndjson_final(
        &self,
        provider: Provider,
        url: &str,
        auth: &dyn Authentication,
        body: &RequestBody,
    ) -> Result<Value> {
        tracing::debug!(%provider, url, "POST (ndjson, complete)");
        let builder = self.request(Method::POST, url, auth)?.json(body);
        let response = self.send(provider, builder, url).await?;
        last_ndjson_value(&response.text().await?)
    }

    /// POST JSON and forward the response body as raw binary frames.
    pub async fn post_byte_stream(
        &self,
        provider: Provider,
        url: &str,
        auth: &dyn Authentication,
        body: &RequestBody,
    ) -> Result<EventSource> {
        tracing::debug!(%provider, url, "POST (byte stream)");
        let builder = self.request(Method::POST, url, auth)?.json(body);
        let response = self.send(provider, builder, url).await?;
        let frames = response.bytes_stream().map(move |item| match item {
            Ok(bytes) => Ok(WireEvent::Binary(bytes)),
            Err(e) => Err(OmniError::Stream(format!("Byte stream error ({provider}): {e}"))),
        });
        Ok(EventSource::new(frames))
    }
}

/// Join a base URL and a path, leaving absolute URLs untouched.
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ApiKey, NoAuth};
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> HttpTransport {
        let config = ClientConfig::builder().header("x-team", "media").build();
        HttpTransport::new(&config).unwrap()
    }

    #[test]
    fn join_keeps_absolute_urls() {
        assert_eq!(join_url("https://api.x.ai/", "/v1/images"), "https://api.x.ai/v1/images");
        assert_eq!(
            join_url("https://api.bfl.ai", "https://eu.api.bfl.ai/v1/get_result?id=1"),
            "https://eu.api.bfl.ai/v1/get_result?id=1"
        );
    }

    #[tokio::test]
    async fn post_json_sends_auth_and_extra_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(header("x-team", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let auth = ApiKey::for_provider(Provider::Anthropic, "sk-test".to_string().into());
        let url = join_url(&server.uri(), "/v1/messages");
        let body = transport()
            .post_json(Provider::Anthropic, &url, &auth, &RequestBody::new())
            .await
            .unwrap();
        assert_eq!(body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn error_status_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(json!({"error": {"message": "Slow down"}}))
                    .insert_header("x-request-id", "req-9"),
            )
            .mount(&server)
            .await;

        let err = transport()
            .post_json(Provider::OpenAI, &server.uri(), &NoAuth, &RequestBody::new())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(429));
        assert_eq!(err.trace_id(), Some("req-9"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn sse_body_becomes_json_events() {
        let server = MockServer::start().await;
        let body = "data: {\"n\":1}\n\n: keep-alive\n\ndata: {\"n\":2}\n\ndata: [DONE]\n\n";
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let source = transport()
            .post_sse(Provider::OpenAI, &server.uri(), &NoAuth, &RequestBody::new())
            .await
            .unwrap();
        let events: Vec<_> = source.map(|e| e.unwrap()).collect().await;
        assert_eq!(
            events,
            vec![WireEvent::Json(json!({"n": 1})), WireEvent::Json(json!({"n": 2}))]
        );
    }

    #[tokio::test]
    async fn binary_body_keeps_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "audio/mpeg")
                    .set_body_bytes(vec![0x49, 0x44, 0x33]),
            )
            .mount(&server)
            .await;

        let response = transport()
            .post_binary(Provider::ElevenLabs, &server.uri(), &NoAuth, &RequestBody::new())
            .await
            .unwrap();
        let RawResponse::Binary { data, content_type } = response else {
            panic!("expected binary response");
        };
        assert_eq!(&data[..], b"ID3");
        assert_eq!(content_type.as_deref(), Some("audio/mpeg"));
    }

    #[tokio::test]
    async fn ndjson_final_returns_last_line() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("{\"done\":false}\n{\"done\":true,\"image\":\"AA==\"}\n"),
            )
            .mount(&server)
            .await;

        let last = transport()
            .post_ndjson_final(Provider::Ollama, &server.uri(), &NoAuth, &RequestBody::new())
            .await
            .unwrap();
        assert_eq!(last["done"], true);
    }
}
