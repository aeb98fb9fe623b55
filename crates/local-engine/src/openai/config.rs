use std::fmt::Debug;

/// Builder for [`OpenAICompatConfig`].
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct OpenAICompatConfigBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
}

impl OpenAICompatConfigBuilder {
    /// Creates a builder with default settings.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key, some local servers require one.
    #[inline]
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> OpenAICompatConfig {
        OpenAICompatConfig {
            api_key: self.api_key,
            base_url: self
                .base_url
                .unwrap_or_else(|| "http://127.0.0.1:8080/v1".to_string()),
        }
    }
}

impl Debug for OpenAICompatConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAICompatConfigBuilder")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Configuration for [`super::OpenAICompatRuntime`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OpenAICompatConfig {
    pub(crate) api_key: Option<String>,
    pub(crate) base_url: String,
}

impl OpenAICompatConfig {
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

impl Debug for OpenAICompatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAICompatConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}
