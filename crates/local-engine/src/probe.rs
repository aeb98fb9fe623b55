use std::io;
use std::path::Path;

/// Detects whether the current environment has hardware acceleration for
/// local inference.
pub trait AccelerationProbe: Send + Sync + 'static {
    /// Probes the environment.
    ///
    /// Errors are allowed here, the engine treats them as "no
    /// acceleration".
    fn probe(&self) -> impl Future<Output = io::Result<bool>> + Send;
}

/// Probes the host system for a GPU usable by local runtimes.
///
/// Apple Silicon Macs always qualify (Metal). On Linux, an NVIDIA device
/// node or a DRM render node qualifies. Other systems don't.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SystemProbe {
    forced: Option<bool>,
}

impl SystemProbe {
    /// Creates a probe that inspects the host system.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a probe that always answers `available`.
    #[inline]
    pub fn forced(available: bool) -> Self {
        Self {
            forced: Some(available),
        }
    }
}

impl AccelerationProbe for SystemProbe {
    async fn probe(&self) -> io::Result<bool> {
        if let Some(forced) = self.forced {
            return Ok(forced);
        }
        if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
            return Ok(true);
        }
        if cfg!(target_os = "linux") {
            if has_device(Path::new("/dev"), "nvidia").await? {
                return Ok(true);
            }
            return has_device(Path::new("/dev/dri"), "renderD").await;
        }
        Ok(false)
    }
}

/// Looks for a device node in `dir` whose name starts with `prefix`.
async fn has_device(dir: &Path, prefix: &str) -> io::Result<bool> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().starts_with(prefix) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forced_probe() {
        assert!(SystemProbe::forced(true).probe().await.unwrap());
        assert!(!SystemProbe::forced(false).probe().await.unwrap());
    }

    #[tokio::test]
    async fn test_device_prefix() {
        let dir = std::env::temp_dir()
            .join(format!("nebula-probe-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        assert!(!has_device(&dir, "nvidia").await.unwrap());

        // Any numbered node counts, not only the first one.
        std::fs::write(dir.join("nvidia3"), b"").unwrap();
        assert!(has_device(&dir, "nvidia").await.unwrap());
        assert!(!has_device(&dir, "renderD").await.unwrap());
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_missing_dir_is_an_error() {
        let result = has_device(Path::new("/nonexistent/dri"), "renderD").await;
        assert!(result.is_err());
    }
}
