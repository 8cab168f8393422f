//! Read-through cache for the global feed.
//!
//! Pages are filled lazily on first read and dropped all at once by
//! `invalidate`. Nothing is invalidated implicitly: writers call
//! `invalidate` synchronously as part of the mutating request.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::{Page, PageRequest, Post};

/// Hit/miss counters, exposed for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub cached_pages: usize,
}

/// Cached pages plus the invalidation generation they were loaded under.
#[derive(Default)]
struct Entries {
    generation: u64,
    pages: HashMap<PageRequest, Page<Post>>,
}

/// Process-wide global feed cache keyed by page request.
pub struct FeedCache {
    enabled: bool,
    entries: RwLock<Entries>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl FeedCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: RwLock::new(Entries::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Serve `request` from the cache, or load it with `load` and remember it.
    ///
    /// A load that overlaps an invalidation is returned but not stored, and
    /// pages past the end are never stored.
    pub async fn get_or_load<F, Fut>(
        &self,
        request: PageRequest,
        load: F,
    ) -> Result<Page<Post>, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Page<Post>, AppError>>,
    {
        if !self.enabled {
            return load().await;
        }

        let generation = {
            let entries = self.entries.read().await;
            if let Some(page) = entries.pages.get(&request) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(page.clone());
            }
            entries.generation
        };

        self.misses.fetch_add(1, Ordering::Relaxed);
        let page = load().await?;

        if request.page > page.total_pages {
            return Ok(page);
        }

        let mut entries = self.entries.write().await;
        if entries.generation == generation {
            entries.pages.insert(request, page.clone());
            tracing::debug!("Cached global feed page {}", request.page);
        } else {
            tracing::debug!("Feed invalidated during load of page {}", request.page);
        }
        Ok(page)
    }

    /// Drop every cached page, including loads still in flight.
    pub async fn invalidate(&self) {
        let mut entries = self.entries.write().await;
        if !entries.pages.is_empty() {
            tracing::debug!("Invalidating {} cached feed pages", entries.pages.len());
        }
        entries.pages.clear();
        entries.generation += 1;
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            cached_pages: self.entries.read().await.pages.len(),
        }
    }
}
