use std::time::Duration;

/// The fixed path of the proxy endpoint.
pub const ENDPOINT_PATH: &str = "/api/nebula";

/// Builder for [`ProxyConfig`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ProxyConfigBuilder {
    base_url: Option<String>,
    user_id: Option<String>,
    token_delay: Option<Duration>,
}

impl ProxyConfigBuilder {
    /// Creates a builder with default settings.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the URL of the server hosting the endpoint.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the user id sent with every request.
    #[inline]
    pub fn with_user_id<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the delay between two simulated chunks.
    #[inline]
    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = Some(delay);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> ProxyConfig {
        ProxyConfig {
            base_url: self
                .base_url
                .unwrap_or_else(|| "http://127.0.0.1:8000".to_string()),
            user_id: self.user_id.unwrap_or_else(|| "blue_admin".to_string()),
            token_delay: self.token_delay.unwrap_or(Duration::from_millis(50)),
        }
    }
}

/// Configuration for the server-proxied engine.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProxyConfig {
    pub(crate) base_url: String,
    pub(crate) user_id: String,
    pub(crate) token_delay: Duration,
}

impl ProxyConfig {
    pub(crate) fn endpoint_url(&self) -> String {
        format!("{}{ENDPOINT_PATH}", self.base_url.trim_end_matches('/'))
    }
}
