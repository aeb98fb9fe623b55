//! Durable storage of the transcript.

use std::error::Error;
use std::fmt::{self, Display};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use nebula_model::ChatMessage;

/// File name of the transcript snapshot.
pub const SNAPSHOT_FILE_NAME: &str = "nebula_messages.json";

/// A single key-value slot that holds the transcript snapshot.
pub trait Store: Send + 'static {
    /// Reads the snapshot, returns `None` if nothing has been written.
    fn read(&self) -> io::Result<Option<String>>;

    /// Overwrites the snapshot.
    fn write(&self, contents: &str) -> io::Result<()>;

    /// Deletes the snapshot. Deleting a missing snapshot is not an error.
    fn delete(&self) -> io::Result<()>;
}

/// Error type of the snapshot operations.
#[derive(Debug)]
pub enum StoreError {
    /// The underlying storage failed.
    Io(io::Error),
    /// The snapshot exists but cannot be parsed.
    Corrupted(serde_json::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "storage failed: {err}"),
            StoreError::Corrupted(err) => write!(f, "corrupted snapshot: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err),
            StoreError::Corrupted(err) => Some(err),
        }
    }
}

impl From<io::Error> for StoreError {
    #[inline]
    fn from(err: io::Error) -> Self {
        StoreError::Io(err)
    }
}

/// Reads the transcript from the store. A missing snapshot yields an empty
/// transcript.
pub fn load_transcript(
    store: &dyn Store,
) -> Result<Vec<ChatMessage>, StoreError> {
    let Some(contents) = store.read()? else {
        return Ok(vec![]);
    };
    serde_json::from_str(&contents).map_err(StoreError::Corrupted)
}

/// Writes the transcript to the store, replacing the previous snapshot.
pub fn save_transcript(
    store: &dyn Store,
    messages: &[ChatMessage],
) -> Result<(), StoreError> {
    let contents =
        serde_json::to_string(messages).map_err(StoreError::Corrupted)?;
    store.write(&contents)?;
    Ok(())
}

/// A store backed by a single JSON file.
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Creates a store that writes to `path`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store that keeps the snapshot in `dir`.
    #[inline]
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir.as_ref().join(SNAPSHOT_FILE_NAME))
    }

    /// Creates a store in the platform data directory, for example
    /// `~/.local/share/nebula` on Linux.
    pub fn default_location() -> Option<Self> {
        dirs::data_dir().map(|dir| Self::in_dir(dir.join("nebula")))
    }

    /// Returns the path of the snapshot file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Store for FileStore {
    fn read(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn write(&self, contents: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, contents)
    }

    fn delete(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

/// An in-memory store. Clones share the same slot.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    /// Creates a store that already holds `contents`.
    #[inline]
    pub fn with_contents<S: Into<String>>(contents: S) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(contents.into()))),
        }
    }

    /// Returns the current snapshot.
    pub fn contents(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl Store for MemoryStore {
    fn read(&self) -> io::Result<Option<String>> {
        Ok(self.contents())
    }

    fn write(&self, contents: &str) -> io::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| io::Error::other("memory store is poisoned"))?;
        *slot = Some(contents.to_owned());
        Ok(())
    }

    fn delete(&self) -> io::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| io::Error::other("memory store is poisoned"))?;
        *slot = None;
        Ok(())
    }
}
