use nebula_model::ErrorKind;
use serde::{Deserialize, Serialize};

/// How a preset response fails after its chunks have been delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetFailure {
    Transport,
    Rejected,
    MalformedResponse,
}

impl From<PresetFailure> for ErrorKind {
    fn from(failure: PresetFailure) -> Self {
        match failure {
            PresetFailure::Transport => ErrorKind::Transport,
            PresetFailure::Rejected => ErrorKind::Rejected,
            PresetFailure::MalformedResponse => ErrorKind::MalformedResponse,
        }
    }
}

/// The preset response for an assistant turn.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Chunks in this response.
    pub chunks: Vec<String>,
    /// If set, the response fails right after the last chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<PresetFailure>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified chunks.
    #[inline]
    pub fn with_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            failure: None,
        }
    }

    /// Makes the response fail after delivering its chunks.
    #[inline]
    pub fn with_failure(mut self, failure: PresetFailure) -> Self {
        self.failure = Some(failure);
        self
    }
}
