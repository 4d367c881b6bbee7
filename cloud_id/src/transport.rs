//! Outbound HTTP transport

use std::{fmt, sync::Arc};

use async_trait::async_trait;

use crate::error::TransportError;

/// The default `User-Agent` sent with outbound requests
pub const DEFAULT_USER_AGENT: &str = concat!("cloud_id/", env!("CARGO_PKG_VERSION"));

/// A response received from an outbound request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
    /// The HTTP status code
    pub status: u16,
    /// The response body, as text
    pub body: String,
}

impl TransportResponse {
    /// Constructs a response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status code indicates success
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A means of issuing HTTP requests to the identity service and to
/// resource services
///
/// Extra headers are supplied as `(name, value)` pairs and are sent in
/// addition to any defaults the transport applies.
#[async_trait]
pub trait Transport: fmt::Debug + Send + Sync {
    /// Issues a `GET` request
    async fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError>;

    /// Issues a `POST` request, with the body (if any) encoded as JSON
    async fn post_json(
        &self,
        url: &str,
        body: Option<&serde_json::Value>,
        headers: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    #[inline]
    async fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError> {
        T::get(&**self, url, headers).await
    }

    #[inline]
    async fn post_json(
        &self,
        url: &str,
        body: Option<&serde_json::Value>,
        headers: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError> {
        T::post_json(&**self, url, body, headers).await
    }
}

/// Default headers applied to every outbound request
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
#[must_use]
pub struct ClientConfig {
    user_agent: String,
    accept: String,
    content_type: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            accept: "application/json".to_owned(),
            content_type: "application/json".to_owned(),
        }
    }
}

impl ClientConfig {
    /// Sets the `User-Agent` header
    pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ..self
        }
    }

    /// Sets the `Accept` header
    pub fn with_accept(self, accept: impl Into<String>) -> Self {
        Self {
            accept: accept.into(),
            ..self
        }
    }

    /// Sets the `Content-Type` header sent with request bodies
    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            ..self
        }
    }

    /// The `User-Agent` header
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// The `Accept` header
    #[must_use]
    pub fn accept(&self) -> &str {
        &self.accept
    }

    /// The `Content-Type` header
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use async_trait::async_trait;
    use reqwest::{header, Client, RequestBuilder};

    use super::{ClientConfig, Transport, TransportResponse};
    use crate::error::TransportError;

    /// A transport backed by a [`reqwest::Client`]
    #[derive(Clone, Debug)]
    pub struct ReqwestTransport {
        client: Client,
        config: ClientConfig,
    }

    impl ReqwestTransport {
        /// Constructs a transport with the default client configuration
        pub fn new() -> Result<Self, TransportError> {
            Self::from_config(ClientConfig::default())
        }

        /// Constructs a transport applying the given default headers
        pub fn from_config(config: ClientConfig) -> Result<Self, TransportError> {
            let client = Client::builder()
                .user_agent(config.user_agent())
                .build()
                .map_err(TransportError::new)?;

            Ok(Self { client, config })
        }

        /// Constructs a transport around an existing client
        ///
        /// The `Accept` and `Content-Type` headers from `config` are still
        /// applied to each request; the `User-Agent` is left to the client.
        pub fn with_client(client: Client, config: ClientConfig) -> Self {
            Self { client, config }
        }

        fn prepare(&self, mut request: RequestBuilder, headers: &[(&str, &str)]) -> RequestBuilder {
            request = request.header(header::ACCEPT, self.config.accept());
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            request
        }

        async fn send(request: RequestBuilder) -> Result<TransportResponse, TransportError> {
            let response = request.send().await.map_err(TransportError::new)?;
            let status = response.status().as_u16();

            tracing::trace!(http.status_code = status, "received response");

            let body = response.text().await.map_err(TransportError::new)?;
            Ok(TransportResponse { status, body })
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        #[tracing::instrument(err, skip(self, headers))]
        async fn get(
            &self,
            url: &str,
            headers: &[(&str, &str)],
        ) -> Result<TransportResponse, TransportError> {
            Self::send(self.prepare(self.client.get(url), headers)).await
        }

        #[tracing::instrument(err, skip(self, body, headers))]
        async fn post_json(
            &self,
            url: &str,
            body: Option<&serde_json::Value>,
            headers: &[(&str, &str)],
        ) -> Result<TransportResponse, TransportError> {
            let mut request = self
                .client
                .post(url)
                .header(header::CONTENT_TYPE, self.config.content_type());
            if let Some(body) = body {
                request = request.body(body.to_string());
            }

            Self::send(self.prepare(request, headers)).await
        }
    }
}
