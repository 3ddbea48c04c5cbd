//! Directory-backed file store

use log::{debug, info, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::storage::validation::validate_file_name;

/// Hidden directory where uploads are staged until complete
const STAGING_DIR: &str = ".partial";

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Transfer metadata for one stored file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    pub length: u64,
}

/// A flat namespace of files inside one directory.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    // Serialises the exists-check and rename that publish an upload
    publish_lock: Mutex<()>,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            publish_lock: Mutex::new(()),
        }
    }

    /// Per-user namespace under a shared base directory.
    pub fn for_user(base: &Path, username: &str) -> Result<Self, StorageError> {
        let username = validate_file_name(username)?;
        Ok(Self::new(base.join(username)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the store directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Lists regular files, sorted by name. Directories are skipped.
    pub async fn list_files(&self) -> Result<Vec<FileDescriptor>, StorageError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::DirectoryNotFound(
                    self.root.display().to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            files.push(FileDescriptor {
                name: entry.file_name().to_string_lossy().into_owned(),
                length: metadata.len(),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Listed {} files in {}", files.len(), self.root.display());
        Ok(files)
    }

    pub async fn file_exists(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.path_for(name)?;
        match fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Size of a stored regular file.
    pub async fn file_length(&self, name: &str) -> Result<u64, StorageError> {
        let path = self.path_for(name)?;
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
            Ok(_) => Err(StorageError::FileNotFound(name.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::FileNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn read_file(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(name)?;
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(fs::read(&path).await?),
            Ok(_) => Err(StorageError::FileNotFound(name.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::FileNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stores a new file. Never overwrites an existing one.
    ///
    /// The bytes are written to the staging directory first and renamed into
    /// place, so a listing never shows a partially written file.
    pub async fn store_file(&self, name: &str, bytes: &[u8]) -> Result<FileDescriptor, StorageError> {
        let final_path = self.path_for(name)?;
        let staging_dir = self.root.join(STAGING_DIR);
        fs::create_dir_all(&staging_dir).await?;

        let serial = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_path = staging_dir.join(format!("{name}.{serial}"));
        if let Err(e) = fs::write(&temp_path, bytes).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        let _guard = self.publish_lock.lock().await;
        if fs::metadata(&final_path).await.is_ok() {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::FileAlreadyExists(name.to_string()));
        }
        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        info!(
            "Stored {} ({} bytes) at {}",
            name,
            bytes.len(),
            final_path.display()
        );
        Ok(FileDescriptor {
            name: name.to_string(),
            length: bytes.len() as u64,
        })
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(validate_file_name(name)?))
    }
}
