//! An engine that relays the conversation to the Nebula server endpoint.
//!
//! The endpoint answers with a single, complete JSON reply. To satisfy the
//! same contract as the streaming engines, [`ProxyEngine`] replays the reply
//! word by word with a fixed delay between words.

#[macro_use]
extern crate tracing;

mod config;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use nebula_model::{ChatMessage, Engine, EngineError, ErrorKind};
use reqwest::{Client, header};

pub use config::{ENDPOINT_PATH, ProxyConfig, ProxyConfigBuilder};
pub use proto::FALLBACK_TEXT;
pub use response::ProxyResponse;

/// Error type for [`ProxyEngine`].
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

impl EngineError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Server-proxied engine.
#[derive(Clone, Debug)]
pub struct ProxyEngine {
    client: Client,
    config: Arc<ProxyConfig>,
}

impl ProxyEngine {
    /// Creates a new `ProxyEngine` with the given configuration.
    #[inline]
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl Engine for ProxyEngine {
    type Error = Error;
    type Response = ProxyResponse;

    fn name(&self) -> &str {
        "Nebula Admin (Hybrid)"
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn send_request(
        &self,
        conversation: &[ChatMessage],
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let request = proto::create_request(conversation, &self.config.user_id);
        let client = self.client.clone();
        let config = Arc::clone(&self.config);

        async move {
            let Some(request) = request else {
                return Err(Error::new(
                    "no user turn to relay",
                    ErrorKind::Rejected,
                ));
            };
            trace!("relaying request: {request:?}");

            let resp = client
                .post(config.endpoint_url())
                .header(header::CONTENT_TYPE, "application/json")
                .json(&request)
                .send()
                .await
                .map_err(|err| {
                    Error::new(format!("{err}"), ErrorKind::Transport)
                })?;

            let status = resp.status();
            if !status.is_success() {
                let kind = if status.is_client_error() {
                    ErrorKind::Rejected
                } else {
                    ErrorKind::Transport
                };
                return Err(Error::new(format!("HTTP {status}"), kind));
            }

            let body = resp.bytes().await.map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::Transport)
            })?;
            Ok(ProxyResponse::new(
                proto::reply_chunks(&body),
                config.token_delay,
            ))
        }
    }
}
