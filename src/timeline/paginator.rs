//! Per-timeline pagination state machine.
//!
//! A [`Paginator`] owns the observable list of one timeline owner. It issues at
//! most one fetch at a time: a trigger that arrives while a fetch is in flight is
//! dropped, never queued. Nothing is published until a fetch has fully succeeded,
//! so an operation that is abandoned mid-flight leaves no trace.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::api::PageFetcher;
use crate::cache::LocalCache;
use crate::error::TimelineError;
use crate::models::{Post, PostId, TimelineKey};

use super::reconcile::{self, MergeKind, Merged};
use super::thread::build_threads;

/// Load state of a timeline
#[derive(Debug, Clone, Default)]
pub enum LoadState {
    /// Nothing has been requested yet
    #[default]
    Idle,
    /// Fetching the newest page
    Refreshing,
    /// Fetching the page below the oldest known post
    Appending,
    /// Fetching the page below a gap marker
    LoadingGap,
    /// The last operation failed
    Error(Arc<TimelineError>),
    /// The last operation succeeded
    NotLoading {
        /// The source has nothing older to give
        end_reached: bool,
    },
}

impl LoadState {
    /// Whether a fetch is in flight
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Refreshing | Self::Appending | Self::LoadingGap)
    }

    /// The failure, if the last operation failed
    pub fn error(&self) -> Option<&TimelineError> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }

    /// Short label for status lines
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Refreshing => "refreshing",
            Self::Appending => "loading older posts",
            Self::LoadingGap => "loading missing posts",
            Self::Error(_) => "error",
            Self::NotLoading { end_reached: true } => "end of timeline",
            Self::NotLoading { end_reached: false } => "ready",
        }
    }
}

/// What a call to the paginator did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Ignored: busy, nothing to load, or end of data
    Skipped,
    /// A page was merged and published
    Loaded(MergeKind),
    /// The operation failed; see [`LoadState::Error`]
    Failed,
}

/// Marks a fetch as in flight until it lands or is dropped
struct Flight<'a> {
    busy: &'a AtomicBool,
    state: &'a watch::Sender<LoadState>,
    previous: Option<LoadState>,
}

impl Flight<'_> {
    fn land(mut self, next: LoadState) {
        self.previous = None;
        self.state.send_replace(next);
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.state.send_replace(previous);
        }
        self.busy.store(false, Ordering::Release);
    }
}

/// Drives refresh/append for one timeline owner
pub struct Paginator<F, C> {
    key: TimelineKey,
    fetcher: F,
    cache: Arc<C>,
    page_size: usize,
    busy: AtomicBool,
    end_reached: AtomicBool,
    state: watch::Sender<LoadState>,
    posts: watch::Sender<Arc<Vec<Post>>>,
}

impl<F: PageFetcher, C: LocalCache> Paginator<F, C> {
    /// Create a paginator; nothing is loaded until `restore` or `refresh`
    pub fn new(key: TimelineKey, fetcher: F, cache: Arc<C>, page_size: usize) -> Self {
        Self {
            key,
            fetcher,
            cache,
            page_size: page_size.max(1),
            busy: AtomicBool::new(false),
            end_reached: AtomicBool::new(false),
            state: watch::Sender::new(LoadState::Idle),
            posts: watch::Sender::new(Arc::new(Vec::new())),
        }
    }

    /// Timeline owner this paginator serves
    pub const fn key(&self) -> &TimelineKey {
        &self.key
    }

    /// Requested page size
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// The page source
    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Current merged and threaded list
    pub fn posts(&self) -> Arc<Vec<Post>> {
        Arc::clone(&self.posts.borrow())
    }

    /// Watch the list; a new value is published after every successful load
    pub fn subscribe_posts(&self) -> watch::Receiver<Arc<Vec<Post>>> {
        self.posts.subscribe()
    }

    /// Current load state
    pub fn load_state(&self) -> LoadState {
        self.state.borrow().clone()
    }

    /// Watch the load state
    pub fn subscribe_state(&self) -> watch::Receiver<LoadState> {
        self.state.subscribe()
    }

    /// Whether the source has been exhausted
    pub fn end_reached(&self) -> bool {
        self.end_reached.load(Ordering::Acquire)
    }

    /// Publish the cached list without fetching (offline start)
    pub async fn restore(&self) -> LoadOutcome {
        let Some(flight) = self.begin(self.load_state()) else {
            return LoadOutcome::Skipped;
        };

        let cached = self.load_cached().await;
        if cached.is_empty() {
            return LoadOutcome::Skipped;
        }

        tracing::debug!("Restored {} cached posts for {}", cached.len(), self.key);
        let posts = Arc::new(build_threads(cached));
        self.posts.send_replace(posts);
        drop(flight);
        LoadOutcome::Loaded(MergeKind::Replaced)
    }

    /// Fetch the newest page and merge it with the cached list
    pub async fn refresh(&self) -> LoadOutcome {
        let Some(flight) = self.begin(LoadState::Refreshing) else {
            tracing::debug!("Refresh of {} ignored, a fetch is in flight", self.key);
            return LoadOutcome::Skipped;
        };

        let fresh = match self.fetcher.fetch_page(None, self.page_size).await {
            Ok(page) => page,
            Err(e) => return self.fail(flight, e.into()),
        };

        let cached = self.load_cached().await;
        let merged = match reconcile::merge(&cached, fresh, self.page_size) {
            Ok(merged) => merged,
            Err(e) => return self.fail(flight, e.into()),
        };

        let end_reached = merged.kind == MergeKind::Drained;
        if end_reached {
            tracing::info!("Timeline {} is empty, clearing cache", self.key);
        }
        let kind = self.publish(merged).await;

        self.end_reached.store(end_reached, Ordering::Release);
        flight.land(LoadState::NotLoading { end_reached });
        LoadOutcome::Loaded(kind)
    }

    /// Fetch the page below the oldest known post
    pub async fn append(&self) -> LoadOutcome {
        if self.end_reached() {
            tracing::debug!("Append on {} ignored, end of timeline reached", self.key);
            return LoadOutcome::Skipped;
        }

        let Some(flight) = self.begin(LoadState::Appending) else {
            tracing::debug!("Append on {} ignored, a fetch is in flight", self.key);
            return LoadOutcome::Skipped;
        };

        let current = self.posts();
        let Some(cursor) = oldest_id(&current) else {
            tracing::debug!("Append on {} ignored, nothing loaded yet", self.key);
            return LoadOutcome::Skipped;
        };

        let older = match self.fetcher.fetch_page(Some(&cursor), self.page_size).await {
            Ok(page) => page,
            Err(e) => return self.fail(flight, e.into()),
        };

        let end_reached = older.len() < self.page_size;
        let merged = match reconcile::extend(&current, older) {
            Ok(merged) => merged,
            Err(e) => return self.fail(flight, e.into()),
        };
        let kind = self.publish(merged).await;

        if end_reached {
            tracing::info!("Reached the end of {}", self.key);
        }
        self.end_reached.store(end_reached, Ordering::Release);
        flight.land(LoadState::NotLoading { end_reached });
        LoadOutcome::Loaded(kind)
    }

    /// Load the posts missing below a gap marker
    pub async fn load_gap(&self, anchor: &PostId) -> LoadOutcome {
        let Some(flight) = self.begin(LoadState::LoadingGap) else {
            tracing::debug!("Gap load on {} ignored, a fetch is in flight", self.key);
            return LoadOutcome::Skipped;
        };

        let current = self.posts();
        if !current
            .iter()
            .any(|post| &post.id == anchor && post.has_gap_below())
        {
            tracing::debug!("No gap below post {} in {}", anchor, self.key);
            return LoadOutcome::Skipped;
        }

        let page = match self.fetcher.fetch_page(Some(anchor), self.page_size).await {
            Ok(page) => page,
            Err(e) => return self.fail(flight, e.into()),
        };

        let merged = match reconcile::fill_gap(&current, anchor, page, self.page_size) {
            Ok(Some(merged)) => merged,
            Ok(None) => return LoadOutcome::Skipped,
            Err(e) => return self.fail(flight, e.into()),
        };
        let kind = self.publish(merged).await;

        flight.land(LoadState::NotLoading {
            end_reached: self.end_reached(),
        });
        LoadOutcome::Loaded(kind)
    }

    /// Claim the single fetch slot and enter `loading`
    fn begin(&self, loading: LoadState) -> Option<Flight<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        let previous = self.state.send_replace(loading);
        Some(Flight {
            busy: &self.busy,
            state: &self.state,
            previous: Some(previous),
        })
    }

    fn fail(&self, flight: Flight<'_>, error: TimelineError) -> LoadOutcome {
        match &error {
            TimelineError::Fetch(e) => {
                tracing::warn!("Failed to fetch {}: {}", self.key, e);
            }
            TimelineError::Invariant(e) => {
                tracing::error!("Rejected page for {}: {}", self.key, e);
            }
        }
        flight.land(LoadState::Error(Arc::new(error)));
        LoadOutcome::Failed
    }

    /// Thread, publish and persist a merge result
    async fn publish(&self, merged: Merged) -> MergeKind {
        let posts = Arc::new(build_threads(merged.posts));
        self.posts.send_replace(Arc::clone(&posts));
        self.persist(posts).await;
        merged.kind
    }

    /// Read the cached list, falling back to the in-memory one.
    ///
    /// A failed read never fails the operation that asked for it.
    async fn load_cached(&self) -> Vec<Post> {
        let cache = Arc::clone(&self.cache);
        let key = self.key.clone();

        match tokio::task::spawn_blocking(move || cache.load(&key)).await {
            Ok(Ok(posts)) => posts,
            Ok(Err(e)) => {
                tracing::warn!("Failed to read cache for {}: {}", self.key, e);
                self.posts().as_ref().clone()
            }
            Err(e) => {
                tracing::warn!("Cache read for {} did not complete: {}", self.key, e);
                self.posts().as_ref().clone()
            }
        }
    }

    /// Write the list to the cache; failures leave the cache stale until the next write
    async fn persist(&self, posts: Arc<Vec<Post>>) {
        let cache = Arc::clone(&self.cache);
        let key = self.key.clone();

        let result = tokio::task::spawn_blocking(move || {
            if posts.is_empty() {
                cache.clear(&key)
            } else {
                cache.replace(&key, &posts)
            }
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to cache {}: {}", self.key, e),
            Err(e) => tracing::warn!("Cache write for {} did not complete: {}", self.key, e),
        }
    }
}

/// Oldest post id in a list, ignoring chain-anchor copies
fn oldest_id(posts: &[Post]) -> Option<PostId> {
    posts
        .iter()
        .filter(|post| !post.is_anchor_copy())
        .map(|post| &post.id)
        .min()
        .cloned()
}
