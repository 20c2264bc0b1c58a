use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use tracing::debug;

use super::{KeyValueStore, StorageError};

const LOCK_FILE_NAME: &str = ".songbook.lock";

/// One JSON document per key inside a data directory.
///
/// Writes go through a temp file and `rename`, under an exclusive advisory
/// lock on `.songbook.lock`, so a reader never observes a half-written
/// document even when two processes share the directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }

    fn lock(&self) -> Result<File, StorageError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(LOCK_FILE_NAME))?;
        file.lock_exclusive()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        Ok(file)
    }

    fn write_locked(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let lock = self.lock()?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");

        let result = (|| {
            let mut file = File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        })();

        let _ = lock.unlock();
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result?;
        debug!(key, path = %path.display(), bytes = value.len(), "wrote document");
        Ok(())
    }

    fn remove_locked(&self, key: &str) -> Result<(), StorageError> {
        let lock = self.lock()?;
        let result = match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        };
        let _ = lock.unlock();
        Ok(result?)
    }
}

async fn blocking<T, F>(f: F) -> Result<T, StorageError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Io(std::io::Error::new(ErrorKind::Other, e)))?
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        blocking(move || match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        let this = self.clone();
        let key = key.to_string();
        blocking(move || this.write_locked(&key, &value)).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let this = self.clone();
        let key = key.to_string();
        blocking(move || this.remove_locked(&key)).await
    }
}
