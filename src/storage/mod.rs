//! Seen-link persistence.
//!
//! A [`SeenStore`] backend reads and writes one [`SeenLinkSet`] per site.
//! During a site pass the set lives in a [`DedupStore`], which serializes
//! the concurrent keyword tasks that diff against and merge into it.

pub mod local;
pub mod seen;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};

// Re-export for convenience
pub use local::LocalStorage;
pub use seen::{LoadedSet, SeenLinkSet};

/// Trait for seen-link storage backends.
#[async_trait]
pub trait SeenStore: Send + Sync {
    /// Load the set stored under `key`.
    ///
    /// A missing or empty backing file yields an empty set.
    async fn load(&self, key: &str) -> Result<LoadedSet>;

    /// Replace the set stored under `key`.
    async fn save(&self, key: &str, set: &SeenLinkSet) -> Result<()>;
}

/// In-memory seen-link set of one site, backed by a [`SeenStore`].
pub struct DedupStore {
    site: String,
    key: String,
    backend: Arc<dyn SeenStore>,
    links: Mutex<SeenLinkSet>,
    write_lock: Mutex<()>,
}

impl DedupStore {
    /// Load the site's set, rewriting it first if it was stored in a legacy shape.
    pub async fn open(
        site: impl Into<String>,
        key: impl Into<String>,
        backend: Arc<dyn SeenStore>,
    ) -> Result<Self> {
        let site = site.into();
        let key = key.into();
        let loaded = backend.load(&key).await?;

        let store = Self {
            site,
            key,
            backend,
            links: Mutex::new(loaded.set),
            write_lock: Mutex::new(()),
        };

        if loaded.needs_migration {
            log::info!(
                "[{}] Migrating {} to the current seen-link format",
                store.site,
                store.key
            );
            if let Err(e) = store.persist().await {
                log::error!("[{}] Migration write failed: {}", store.site, e);
            }
        }

        Ok(store)
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    /// Number of links currently held in memory.
    pub async fn len(&self) -> usize {
        self.links.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.links.lock().await.is_empty()
    }

    pub async fn contains(&self, link: &str) -> bool {
        self.links.lock().await.contains(link)
    }

    /// Copy of the in-memory set.
    pub async fn snapshot(&self) -> SeenLinkSet {
        self.links.lock().await.clone()
    }

    /// Return the candidates not seen before and mark all of them as seen.
    pub async fn diff_and_merge<S: AsRef<str>>(&self, candidates: &[S]) -> Vec<String> {
        self.links.lock().await.diff_and_merge(candidates)
    }

    /// Write the in-memory set to the backend.
    ///
    /// On failure the in-memory set keeps every merged link, so the next
    /// successful persist includes them.
    pub async fn persist(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.snapshot().await;
        self.backend
            .save(&self.key, &snapshot)
            .await
            .map_err(|e| AppError::persist(&self.site, e))
    }
}
