//! Logical name → instance binding.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_core::StorageError;
use tracing::{debug, info};

use crate::instance::SqliteInstance;

/// File extension of file-backed instances.
pub const INSTANCE_EXTENSION: &str = "sqlite";

/// Shared registry of bound instances.
///
/// With a data directory every instance lives at `<dir>/<name>.sqlite`;
/// without one, instances are in-memory and vanish when dropped.
#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    instances: Arc<DashMap<String, Arc<SqliteInstance>>>,
    data_dir: Option<PathBuf>,
}

impl InstanceRegistry {
    /// Registry of in-memory instances.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Registry of file-backed instances under `dir` (created if missing).
    pub fn with_data_dir(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StorageError::Io {
            reason: format!("failed to create {}: {}", dir.display(), e),
        })?;
        Ok(Self {
            instances: Arc::new(DashMap::new()),
            data_dir: Some(dir),
        })
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    fn path_for(&self, name: &str) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.{}", name, INSTANCE_EXTENSION)))
    }

    /// Create and bind an instance. A file left by a soft removal is
    /// reopened, which is how a name gets re-bound.
    pub fn create(&self, name: &str) -> Result<Arc<SqliteInstance>, StorageError> {
        match self.instances.entry(name.to_string()) {
            Entry::Occupied(_) => Err(StorageError::InstanceExists {
                name: name.to_string(),
            }),
            Entry::Vacant(slot) => {
                let instance = match self.path_for(name) {
                    Some(path) => SqliteInstance::open(name, path)?,
                    None => SqliteInstance::open_in_memory(name)?,
                };
                let instance = Arc::new(instance);
                slot.insert(Arc::clone(&instance));
                info!(db = %name, "Instance bound");
                Ok(instance)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<SqliteInstance>> {
        self.instances.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    /// Soft removal: unbind the name, keep any file.
    pub fn remove(&self, name: &str) -> Option<Arc<SqliteInstance>> {
        let removed = self.instances.remove(name).map(|(_, instance)| instance);
        if removed.is_some() {
            info!(db = %name, "Instance unbound");
        }
        removed
    }

    /// Hard removal: unbind the name and delete its files.
    ///
    /// Returns whether the name was bound. An unbound name deletes nothing.
    pub fn destroy(&self, name: &str) -> Result<bool, StorageError> {
        let Some(removed) = self.remove(name) else {
            return Ok(false);
        };
        let path = removed
            .path()
            .map(Path::to_path_buf)
            .or_else(|| self.path_for(name));
        drop(removed);

        if let Some(path) = path {
            for suffix in ["", "-wal", "-shm"] {
                let file = PathBuf::from(format!("{}{}", path.display(), suffix));
                match fs::remove_file(&file) {
                    Ok(()) => debug!(file = %file.display(), "Removed instance file"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(StorageError::Io {
                            reason: format!("failed to remove {}: {}", file.display(), e),
                        })
                    }
                }
            }
        }
        Ok(true)
    }

    /// Bind every `<name>.sqlite` file found in the data directory.
    pub fn load_existing(&self) -> Result<usize, StorageError> {
        let Some(dir) = self.data_dir.clone() else {
            return Ok(0);
        };
        let entries = fs::read_dir(&dir).map_err(|e| StorageError::Io {
            reason: format!("failed to read {}: {}", dir.display(), e),
        })?;

        let mut loaded = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(INSTANCE_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !self.contains(name) {
                self.create(name)?;
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// Bound names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
