//! File persistence collaborator.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Byte-level file access used by domains that serve saved data.
pub trait Persistence: Send + Sync + 'static {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write_file(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

/// Files under a root directory.
#[derive(Debug, Clone)]
pub struct FsPersistence {
    root: PathBuf,
}

impl FsPersistence {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve `path` under the root, refusing anything that escapes it.
    fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path escapes save root: {}", path.display()),
            ));
        }
        Ok(self.root.join(path))
    }
}

impl Persistence for FsPersistence {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        let full = self.resolve(path)?;
        std::fs::read(&full)
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, bytes)?;
        debug!(path = %full.display(), bytes = bytes.len(), "File written");
        Ok(())
    }
}

/// In-memory files, for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    files: Arc<RwLock<HashMap<PathBuf, Vec<u8>>>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "persistence lock poisoned")
}

impl Persistence for MemoryPersistence {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .read()
            .map_err(|_| poisoned())?
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        self.files
            .write()
            .map_err(|_| poisoned())?
            .insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}
