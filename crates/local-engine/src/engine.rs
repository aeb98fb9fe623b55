use std::sync::Arc;

use nebula_model::{ChatMessage, Engine};
use tokio::sync::OnceCell;

use crate::probe::{AccelerationProbe, SystemProbe};
use crate::progress::LoadProgress;
use crate::runtime::{LocalRuntime, LocalSession, StatusFn};

/// The model artifact loaded when none is configured.
pub const DEFAULT_MODEL: &str = "Llama-3-8B-Instruct-q4f32_1-MLC";

/// On-device engine.
///
/// The engine is only available when the probe finds hardware
/// acceleration. The model session is loaded lazily by the first request
/// and shared by the following ones. If loading fails, the next request
/// tries again.
pub struct LocalEngine<R: LocalRuntime, P = SystemProbe> {
    runtime: Arc<R>,
    probe: P,
    model: Arc<str>,
    session: Arc<OnceCell<Arc<R::Session>>>,
    on_status: StatusFn,
}

impl<R: LocalRuntime> LocalEngine<R> {
    /// Creates an engine running on `runtime`, probing the host system.
    pub fn new(runtime: R) -> Self {
        Self {
            runtime: Arc::new(runtime),
            probe: SystemProbe::new(),
            model: Arc::from(DEFAULT_MODEL),
            session: Default::default(),
            on_status: Arc::new(|status| trace!("load status: {status}")),
        }
    }
}

impl<R: LocalRuntime, P: AccelerationProbe> LocalEngine<R, P> {
    /// Replaces the acceleration probe.
    pub fn with_probe<Q: AccelerationProbe>(
        self,
        probe: Q,
    ) -> LocalEngine<R, Q> {
        LocalEngine {
            runtime: self.runtime,
            probe,
            model: self.model,
            session: self.session,
            on_status: self.on_status,
        }
    }

    /// Sets the model artifact to load.
    #[inline]
    pub fn with_model<S: AsRef<str>>(mut self, model: S) -> Self {
        self.model = Arc::from(model.as_ref());
        self
    }

    /// Attaches a callback to be invoked with the loading progress of the
    /// model session.
    pub fn on_progress(
        mut self,
        on_progress: impl Fn(LoadProgress) + Send + Sync + 'static,
    ) -> Self {
        self.on_status = Arc::new(move |status| {
            let progress = LoadProgress::from_text(status);
            trace!("load progress: {progress:?}");
            on_progress(progress);
        });
        self
    }

    /// Returns the model artifact name.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns whether the model session has been loaded.
    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.session.initialized()
    }
}

impl<R: LocalRuntime, P: AccelerationProbe> Engine for LocalEngine<R, P> {
    type Error = R::Error;
    type Response = <R::Session as LocalSession>::Response;

    fn name(&self) -> &str {
        "Local Accelerated"
    }

    async fn is_available(&self) -> bool {
        match self.probe.probe().await {
            Ok(available) => available,
            Err(err) => {
                debug!("acceleration probe failed: {err}");
                false
            }
        }
    }

    fn send_request(
        &self,
        conversation: &[ChatMessage],
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let runtime = Arc::clone(&self.runtime);
        let session = Arc::clone(&self.session);
        let model = Arc::clone(&self.model);
        let on_status = Arc::clone(&self.on_status);
        let conversation = conversation.to_vec();

        async move {
            let session = session
                .get_or_try_init(|| async move {
                    info!("loading local model {model}");
                    runtime.load(&model, on_status).await.map(Arc::new)
                })
                .await?;
            session.stream(&conversation).await
        }
    }
}
