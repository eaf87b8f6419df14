//! One paginator per timeline owner.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::PageFetcher;
use crate::cache::LocalCache;
use crate::models::TimelineKey;

use super::Paginator;

/// Paginators keyed by timeline owner, sharing one cache
pub struct TimelineRegistry<F, C> {
    cache: Arc<C>,
    page_size: usize,
    timelines: Mutex<HashMap<TimelineKey, Arc<Paginator<F, C>>>>,
}

impl<F: PageFetcher, C: LocalCache> TimelineRegistry<F, C> {
    /// Create an empty registry; every paginator shares `cache`
    pub fn new(cache: Arc<C>, page_size: usize) -> Self {
        Self {
            cache,
            page_size,
            timelines: Mutex::new(HashMap::new()),
        }
    }

    fn timelines(&self) -> MutexGuard<'_, HashMap<TimelineKey, Arc<Paginator<F, C>>>> {
        self.timelines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared cache
    pub const fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    /// Paginator for `key`, if one was opened
    pub fn get(&self, key: &TimelineKey) -> Option<Arc<Paginator<F, C>>> {
        self.timelines().get(key).cloned()
    }

    /// Paginator for `key`, creating it with a fetcher from `make_fetcher` on first use
    pub fn get_or_insert_with(
        &self,
        key: &TimelineKey,
        make_fetcher: impl FnOnce() -> F,
    ) -> Arc<Paginator<F, C>> {
        let mut timelines = self.timelines();
        let paginator = timelines.entry(key.clone()).or_insert_with(|| {
            tracing::debug!("Opening timeline {}", key);
            Arc::new(Paginator::new(
                key.clone(),
                make_fetcher(),
                Arc::clone(&self.cache),
                self.page_size,
            ))
        });
        Arc::clone(paginator)
    }

    /// Forget a timeline; its cached list is left alone
    pub fn remove(&self, key: &TimelineKey) -> Option<Arc<Paginator<F, C>>> {
        self.timelines().remove(key)
    }

    /// Keys of every open timeline
    pub fn keys(&self) -> Vec<TimelineKey> {
        self.timelines().keys().cloned().collect()
    }

    /// Every open paginator
    pub fn paginators(&self) -> Vec<Arc<Paginator<F, C>>> {
        self.timelines().values().cloned().collect()
    }

    /// Number of open timelines
    pub fn len(&self) -> usize {
        self.timelines().len()
    }

    /// Check if no timeline is open.
    pub fn is_empty(&self) -> bool {
        self.timelines().is_empty()
    }
}
