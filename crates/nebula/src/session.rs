use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nebula_cloud_engine::{CloudConfigBuilder, CloudEngine};
use nebula_core::{
    ChatManager, ChatManagerBuilder, Deployment, EngineSelector, FileStore,
    MemoryStore,
};
use nebula_local_engine::{
    LoadProgress, LocalEngine, OpenAICompatConfigBuilder, OpenAICompatRuntime,
    SystemProbe,
};
use nebula_proxy_engine::{ProxyConfigBuilder, ProxyEngine};

use crate::config::Config;

type ProgressFn = Arc<dyn Fn(&LoadProgress) + Send + Sync>;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    config: Config,
    on_progress: Option<ProgressFn>,
}

impl SessionBuilder {
    /// Creates a session builder with the given configuration.
    #[inline]
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            on_progress: None,
        }
    }

    /// Attaches a callback to be invoked while the on-device model is
    /// loading.
    #[inline]
    pub fn on_progress(
        mut self,
        on_progress: impl Fn(&LoadProgress) + Send + Sync + 'static,
    ) -> Self {
        self.on_progress = Some(Arc::new(on_progress));
        self
    }

    /// Builds a new session.
    ///
    /// This must be called within a Tokio runtime.
    pub fn build(self) -> Session {
        let Self {
            config,
            on_progress,
        } = self;

        let store_path = config
            .data_dir
            .as_ref()
            .map(FileStore::in_dir)
            .or_else(FileStore::default_location);
        let mut builder = ChatManagerBuilder::new()
            .with_mode(config.mode)
            .annotate_engine(config.annotate_engine);
        let store_path = match store_path {
            Some(store) => {
                let path = store.path().to_owned();
                builder = builder.with_store(store);
                Some(path)
            }
            None => {
                warn!("no data directory, the transcript will not be kept");
                builder = builder.with_store(MemoryStore::default());
                None
            }
        };

        let selector = build_selector(&config, &builder, on_progress);
        let manager = builder.with_selector(selector).build();
        Session {
            manager,
            store_path,
        }
    }
}

fn build_selector(
    config: &Config,
    builder: &ChatManagerBuilder,
    on_progress: Option<ProgressFn>,
) -> EngineSelector {
    let mut selector = EngineSelector::new(config.deployment);

    if let Some(local_url) = &config.local_url {
        let runtime = OpenAICompatRuntime::new(
            OpenAICompatConfigBuilder::new()
                .with_base_url(local_url)
                .build(),
        );
        let probe = match config.force_acceleration {
            Some(forced) => SystemProbe::forced(forced),
            None => SystemProbe::new(),
        };
        let reporter = builder.progress_reporter();
        let mut engine = LocalEngine::new(runtime)
            .with_probe(probe)
            .on_progress(move |progress| {
                reporter.report(progress.percent);
                if let Some(on_progress) = &on_progress {
                    on_progress(&progress);
                }
            });
        if let Some(model) = &config.local_model {
            engine = engine.with_model(model);
        }
        selector = selector.with_local(engine);
    } else if config.deployment != Deployment::ProxyOnly {
        debug!("no local runtime configured, on-device engine skipped");
    }

    match &config.cloud_api_key {
        Some(api_key) => {
            let mut cloud = CloudConfigBuilder::with_api_key(api_key);
            if let Some(model) = &config.cloud_model {
                cloud = cloud.with_model(model);
            }
            selector = selector.with_cloud(CloudEngine::new(cloud.build()));
        }
        None if config.deployment == Deployment::Standard => {
            warn!("GEMINI_API_KEY is not set, cloud engine skipped");
        }
        None => {}
    }

    let mut proxy = ProxyConfigBuilder::new();
    if let Some(proxy_url) = &config.proxy_url {
        proxy = proxy.with_base_url(proxy_url);
    }
    selector.with_proxy(ProxyEngine::new(proxy.build()))
}

/// A chat session, holding a fully configured [`ChatManager`] that you can
/// use directly.
pub struct Session {
    manager: ChatManager,
    store_path: Option<PathBuf>,
}

impl Session {
    /// Returns the path of the transcript snapshot, if it is kept on disk.
    #[inline]
    pub fn store_path(&self) -> Option<&Path> {
        self.store_path.as_deref()
    }
}

impl Deref for Session {
    type Target = ChatManager;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.manager
    }
}
