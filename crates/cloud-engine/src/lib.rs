//! An engine backed by the Gemini streaming chat API.

#[macro_use]
extern crate tracing;

mod config;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use nebula_model::{ChatMessage, Engine, EngineError, ErrorKind};
use nebula_sse::{Chunks, Sse};
use reqwest::{Client, header};

pub use config::{CloudConfig, CloudConfigBuilder};
pub use response::CloudResponse;

/// Error type for [`CloudEngine`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl From<nebula_sse::Error> for Error {
    fn from(err: nebula_sse::Error) -> Self {
        let kind = match err {
            nebula_sse::Error::ChunksError(_) => ErrorKind::Transport,
            nebula_sse::Error::InvalidPayload => ErrorKind::MalformedResponse,
        };
        Error::new(format!("{err:?}"), kind)
    }
}

impl EngineError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Cloud-hosted engine.
///
/// The engine is always reported as available: given a configured
/// credential, its failures only show up when a request is sent.
#[derive(Clone, Debug)]
pub struct CloudEngine {
    client: Client,
    config: Arc<CloudConfig>,
}

impl CloudEngine {
    /// Creates a new `CloudEngine` with the given configuration.
    #[inline]
    pub fn new(config: CloudConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl Engine for CloudEngine {
    type Error = Error;
    type Response = CloudResponse;

    fn name(&self) -> &str {
        "Gemini Cloud"
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn send_request(
        &self,
        conversation: &[ChatMessage],
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let request = proto::create_request(conversation);
        let client = self.client.clone();
        let config = Arc::clone(&self.config);

        async move {
            let Some(request) = request else {
                return Err(Error::new(
                    "conversation is empty",
                    ErrorKind::Rejected,
                ));
            };
            let resp = client
                .post(config.stream_url())
                .header("x-goog-api-key", &config.api_key)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::ACCEPT, "text/event-stream")
                .json(&request)
                .send()
                .await
                .map_err(|err| Error::new(format!("{err}"), ErrorKind::Transport))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                warn!("request failed with {status}: {body}");
                let kind = if status.is_client_error() {
                    ErrorKind::Rejected
                } else {
                    ErrorKind::Transport
                };
                return Err(Error::new(format!("HTTP {status}"), kind));
            }

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_valid_content_type = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.subtype().as_str() == "event-stream")
                .unwrap_or(false);
            if !is_valid_content_type {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::MalformedResponse,
                ));
            }

            // Here we got a successful response.
            let chunks = Chunks::from_response(resp);
            let sse = Sse::new(chunks);
            Ok(CloudResponse::from_sse(sse))
        }
    }
}
