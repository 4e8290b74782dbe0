use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use moka::future::Cache;

use crate::core::snapshot::Snapshot;

/// One JSON document per dataset key, replaced atomically on every write.
/// A read-through in-memory cache sits in front of the files so that
/// repeated validity checks do not hit the disk.
#[derive(Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    read_cache: Cache<String, Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            read_cache: Cache::builder()
                .time_to_live(std::time::Duration::from_secs(60 * 60))
                .build(),
        }
    }

    fn path_of(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Returns the stored snapshot, or None when no document exists for the
    /// key. A document that cannot be parsed is treated as missing so a
    /// refresh can overwrite it. Misses are never cached.
    pub async fn get(&self, key: &str) -> Option<Snapshot> {
        if let Some(cached) = self.read_cache.get(key).await {
            return Some(cached.as_ref().clone());
        }

        let path = self.path_of(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(key, path = %path.display(), error = %e, "Snapshot file not readable");
                return None;
            }
        };

        match serde_json::from_slice::<Snapshot>(&raw) {
            Ok(snapshot) => {
                self.read_cache.insert(key.to_owned(), Arc::new(snapshot.clone())).await;
                Some(snapshot)
            }
            Err(e) => {
                tracing::warn!(key, path = %path.display(), error = %e, "Snapshot file corrupt, ignoring");
                None
            }
        }
    }

    /// Writes the complete document via a temp file and rename, so a crash
    /// mid-write never leaves a half snapshot behind.
    pub async fn put(&self, key: &str, snapshot: &Snapshot) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Error creating snapshot directory {}", self.dir.display()))?;

        let path = self.path_of(key);
        let tmp = tmp_path(&path);

        let body = serde_json::to_vec_pretty(snapshot).context("Error serializing snapshot")?;
        tokio::fs::write(&tmp, &body)
            .await
            .with_context(|| format!("Error writing snapshot to {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Error moving snapshot into place at {}", path.display()))?;

        self.read_cache.insert(key.to_owned(), Arc::new(snapshot.clone())).await;

        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}
