//! Runtime selection between the configured engines.

use std::error::Error;
use std::fmt::{self, Display};
use std::str::FromStr;

use nebula_model::Engine;

use crate::client::EngineClient;

/// The kind of an engine known to the selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineVariant {
    /// On-device accelerated inference.
    Local,
    /// Cloud API inference.
    Cloud,
    /// Server-proxied inference.
    Proxy,
}

/// Decides which engines are candidates, and in which order.
///
/// The cloud and the proxied engines are alternatives, a deployment never
/// probes both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Deployment {
    /// On-device first, then the cloud.
    #[default]
    Standard,
    /// On-device first, then the server proxy.
    Admin,
    /// The server proxy only.
    ProxyOnly,
}

impl Deployment {
    /// Returns the probing order of this deployment.
    pub fn candidates(self) -> &'static [EngineVariant] {
        match self {
            Deployment::Standard => &[EngineVariant::Local, EngineVariant::Cloud],
            Deployment::Admin => &[EngineVariant::Local, EngineVariant::Proxy],
            Deployment::ProxyOnly => &[EngineVariant::Proxy],
        }
    }
}

impl FromStr for Deployment {
    type Err = UnknownDeploymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Deployment::Standard),
            "admin" => Ok(Deployment::Admin),
            "proxy" | "proxy_only" => Ok(Deployment::ProxyOnly),
            _ => Err(UnknownDeploymentError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an unknown deployment name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownDeploymentError(String);

impl Display for UnknownDeploymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown deployment: {:?}", self.0)
    }
}

impl Error for UnknownDeploymentError {}

/// The state of an [`EngineSelector`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectorState {
    /// Nothing has been probed yet, or the last probing found nothing.
    #[default]
    Unresolved,
    /// Candidates are being probed.
    Probing,
    /// An engine has been selected.
    Resolved(EngineVariant),
}

/// Error returned when the selector cannot resolve an engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectorError {
    /// None of the candidates of the deployment is available.
    NoEngineAvailable,
}

impl Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorError::NoEngineAvailable => {
                "no engine is available for this deployment".fmt(f)
            }
        }
    }
}

impl Error for SelectorError {}

/// Selects the active engine, probing the candidates of its deployment in
/// order and falling back when the selected one becomes unavailable.
#[derive(Debug)]
pub struct EngineSelector {
    deployment: Deployment,
    local: Option<EngineClient>,
    cloud: Option<EngineClient>,
    proxy: Option<EngineClient>,
    state: SelectorState,
}

impl EngineSelector {
    /// Creates a selector with no engines attached.
    #[inline]
    pub fn new(deployment: Deployment) -> Self {
        Self {
            deployment,
            local: None,
            cloud: None,
            proxy: None,
            state: SelectorState::Unresolved,
        }
    }

    /// Attaches the on-device engine.
    #[inline]
    pub fn with_local<E: Engine + 'static>(mut self, engine: E) -> Self {
        self.local = Some(EngineClient::new(engine));
        self
    }

    /// Attaches the cloud engine.
    #[inline]
    pub fn with_cloud<E: Engine + 'static>(mut self, engine: E) -> Self {
        self.cloud = Some(EngineClient::new(engine));
        self
    }

    /// Attaches the server-proxied engine.
    #[inline]
    pub fn with_proxy<E: Engine + 'static>(mut self, engine: E) -> Self {
        self.proxy = Some(EngineClient::new(engine));
        self
    }

    /// Returns the deployment of this selector.
    #[inline]
    pub fn deployment(&self) -> Deployment {
        self.deployment
    }

    /// Returns the current state.
    #[inline]
    pub fn state(&self) -> SelectorState {
        self.state
    }

    /// Returns the variant of the resolved engine, if any.
    #[inline]
    pub fn active_variant(&self) -> Option<EngineVariant> {
        match self.state {
            SelectorState::Resolved(variant) => Some(variant),
            _ => None,
        }
    }

    /// Returns the name of the resolved engine, if any.
    pub fn active_name(&self) -> Option<&str> {
        self.active_variant()
            .and_then(|variant| self.client(variant))
            .map(EngineClient::name)
    }

    /// Returns the engine to use for the next request.
    ///
    /// The resolved engine is kept as long as it reports available.
    /// Otherwise the candidates are probed again in order.
    pub async fn resolve(&mut self) -> Result<EngineClient, SelectorError> {
        if let Some(variant) = self.active_variant() {
            if let Some(client) = self.client(variant) {
                if client.is_available().await {
                    return Ok(client.clone());
                }
                warn!("{} is no longer available, re-probing", client.name());
            }
        }

        self.state = SelectorState::Probing;
        debug!("probing engines for {:?}", self.deployment);
        for &variant in self.deployment.candidates() {
            let Some(client) = self.client(variant) else {
                trace!("{variant:?} is not configured, skipped");
                continue;
            };
            if client.is_available().await {
                debug!("resolved {variant:?}: {}", client.name());
                let client = client.clone();
                self.state = SelectorState::Resolved(variant);
                return Ok(client);
            }
            debug!("{} is unavailable", client.name());
        }

        self.state = SelectorState::Unresolved;
        error!("no engine is available for {:?}", self.deployment);
        Err(SelectorError::NoEngineAvailable)
    }

    fn client(&self, variant: EngineVariant) -> Option<&EngineClient> {
        match variant {
            EngineVariant::Local => self.local.as_ref(),
            EngineVariant::Cloud => self.cloud.as_ref(),
            EngineVariant::Proxy => self.proxy.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use nebula_test_engine::TestEngine;

    use super::*;

    #[tokio::test]
    async fn test_fallback_order() {
        let local = TestEngine::with_name("Local");
        local.set_available(false);
        let mut selector = EngineSelector::new(Deployment::Standard)
            .with_local(local.clone())
            .with_cloud(TestEngine::with_name("Cloud"))
            .with_proxy(TestEngine::with_name("Proxy"));
        assert_eq!(selector.state(), SelectorState::Unresolved);

        let client = selector.resolve().await.unwrap();
        assert_eq!(client.name(), "Cloud");
        assert_eq!(
            selector.state(),
            SelectorState::Resolved(EngineVariant::Cloud)
        );

        // The resolved engine is kept while it stays available, even if a
        // preferred one comes back.
        local.set_available(true);
        let client = selector.resolve().await.unwrap();
        assert_eq!(client.name(), "Cloud");
        assert_eq!(selector.active_name(), Some("Cloud"));
    }

    #[tokio::test]
    async fn test_admin_deployment() {
        let local = TestEngine::with_name("Local");
        local.set_available(false);
        let mut selector = EngineSelector::new(Deployment::Admin)
            .with_local(local)
            .with_cloud(TestEngine::with_name("Cloud"))
            .with_proxy(TestEngine::with_name("Proxy"));
        let client = selector.resolve().await.unwrap();
        assert_eq!(client.name(), "Proxy");

        let mut selector = EngineSelector::new(Deployment::ProxyOnly)
            .with_local(TestEngine::with_name("Local"))
            .with_proxy(TestEngine::with_name("Proxy"));
        let client = selector.resolve().await.unwrap();
        assert_eq!(client.name(), "Proxy");
    }

    #[tokio::test]
    async fn test_reprobe() {
        let local = TestEngine::with_name("Local");
        let cloud = TestEngine::with_name("Cloud");
        let mut selector = EngineSelector::new(Deployment::Standard)
            .with_local(local.clone())
            .with_cloud(cloud);
        assert_eq!(selector.resolve().await.unwrap().name(), "Local");

        local.set_available(false);
        assert_eq!(selector.resolve().await.unwrap().name(), "Cloud");
        assert_eq!(selector.active_variant(), Some(EngineVariant::Cloud));
    }

    #[tokio::test]
    async fn test_no_engine_available() {
        let cloud = TestEngine::with_name("Cloud");
        cloud.set_available(false);
        let mut selector =
            EngineSelector::new(Deployment::Standard).with_cloud(cloud);
        assert_eq!(
            selector.resolve().await.unwrap_err(),
            SelectorError::NoEngineAvailable
        );
        assert_eq!(selector.state(), SelectorState::Unresolved);
        assert_eq!(selector.active_name(), None);

        let mut selector = EngineSelector::new(Deployment::ProxyOnly);
        assert!(selector.resolve().await.is_err());
    }

    #[test]
    fn test_parse_deployment() {
        assert_eq!("Admin".parse(), Ok(Deployment::Admin));
        assert_eq!("proxy".parse(), Ok(Deployment::ProxyOnly));
        assert_eq!("standard".parse(), Ok(Deployment::Standard));
        assert!("edge".parse::<Deployment>().is_err());
    }
}
