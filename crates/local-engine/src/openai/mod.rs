//! A runtime backed by a local server speaking the OpenAI chat completion
//! protocol.

mod config;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use nebula_model::{ChatMessage, EngineError, ErrorKind};
use nebula_sse::{Chunks, Sse};
use reqwest::{Client, RequestBuilder, Response, header};

pub use config::{OpenAICompatConfig, OpenAICompatConfigBuilder};
use proto::ModelList;
pub use response::OpenAICompatResponse;

use crate::runtime::{LocalRuntime, LocalSession, StatusFn};

/// Error type for [`OpenAICompatRuntime`].
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

    fn from_status(resp: &Response) -> Self {
        let status = resp.status();
        let kind = if status.is_client_error() {
            ErrorKind::Rejected
        } else {
            ErrorKind::Transport
        };
        Self::new(format!("HTTP {status}"), kind)
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

/// Local OpenAI-compatible runtime.
#[derive(Clone, Debug)]
pub struct OpenAICompatRuntime {
    client: Client,
    config: Arc<OpenAICompatConfig>,
}

impl OpenAICompatRuntime {
    /// Creates a new runtime with the given configuration.
    #[inline]
    pub fn new(config: OpenAICompatConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

fn authorize(
    builder: RequestBuilder,
    config: &OpenAICompatConfig,
) -> RequestBuilder {
    match &config.api_key {
        Some(api_key) => {
            builder.header(header::AUTHORIZATION, format!("Bearer {api_key}"))
        }
        None => builder,
    }
}

impl LocalRuntime for OpenAICompatRuntime {
    type Error = Error;
    type Session = OpenAICompatSession;

    async fn load(
        &self,
        model: &str,
        on_status: StatusFn,
    ) -> Result<Self::Session, Self::Error> {
        on_status(&format!("Connecting to local runtime for {model}: 0%"));

        let resp = authorize(
            self.client.get(self.config.url("/models")),
            &self.config,
        )
        .send()
        .await
        .map_err(|err| Error::new(format!("{err}"), ErrorKind::Transport))?;
        if !resp.status().is_success() {
            return Err(Error::from_status(&resp));
        }
        let models = resp.json::<ModelList>().await.map_err(|err| {
            Error::new(format!("{err}"), ErrorKind::MalformedResponse)
        })?;

        // Servers hosting a single model tend to ignore the requested name,
        // so a missing entry is not fatal.
        if !models.data.iter().any(|entry| entry.id == model) {
            warn!(
                "model {model} is not listed by the runtime, available: {:?}",
                models.data.iter().map(|e| &e.id).collect::<Vec<_>>()
            );
        }
        on_status(&format!("Finish loading {model}: 100%"));

        Ok(OpenAICompatSession {
            client: self.client.clone(),
            config: Arc::clone(&self.config),
            model: model.to_owned(),
        })
    }
}

/// A model served by [`OpenAICompatRuntime`].
#[derive(Clone, Debug)]
pub struct OpenAICompatSession {
    client: Client,
    config: Arc<OpenAICompatConfig>,
    model: String,
}

impl LocalSession for OpenAICompatSession {
    type Error = Error;
    type Response = OpenAICompatResponse;

    fn stream(
        &self,
        conversation: &[ChatMessage],
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let request = proto::create_request(conversation, &self.model);
        let resp_fut = authorize(
            self.client.post(self.config.url("/chat/completions")),
            &self.config,
        )
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "text/event-stream")
        .json(&request)
        .send();

        async move {
            let resp = resp_fut.await.map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::Transport)
            })?;
            if !resp.status().is_success() {
                return Err(Error::from_status(&resp));
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

            let chunks = Chunks::from_response(resp);
            Ok(OpenAICompatResponse::from_sse(Sse::new(chunks)))
        }
    }
}
