//! Site adapter contract.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::SiteConfig;

/// Searches one marketplace for a keyword.
///
/// Implementations may be slow (tens of seconds) and may fail with
/// transient errors; callers treat any failure as "no results for this
/// keyword this cycle". Implementations should cap their own result count.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Return raw candidate links for `keyword`, most recent first.
    async fn search(&self, keyword: &str) -> Result<Vec<String>>;
}

/// A watched marketplace bound to its adapter.
#[derive(Clone)]
pub struct Site {
    /// Stable identifier
    pub id: String,

    /// Display name used in notifications
    pub name: String,

    /// Maximum simultaneous adapter calls
    pub capacity: usize,

    /// Key of the seen-link file in the storage backend
    pub store_key: String,

    pub adapter: Arc<dyn SiteAdapter>,
}

impl Site {
    pub fn new(config: &SiteConfig, adapter: Arc<dyn SiteAdapter>) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            capacity: config.concurrency.max(1),
            store_key: config.seen_file(),
            adapter,
        }
    }
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("store_key", &self.store_key)
            .finish_non_exhaustive()
    }
}
