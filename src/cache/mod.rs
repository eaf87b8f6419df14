//! Local persistence of materialized timelines

mod memory;

pub use memory::MemoryCache;

use crate::models::{Post, TimelineKey};

/// Keyed, ordered storage of one post list per timeline owner.
///
/// Calls are blocking; the paginator runs them on the blocking thread pool.
pub trait LocalCache: Send + Sync + 'static {
    /// Error type returned by this cache
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the stored list, newest first (empty when nothing is stored)
    fn load(&self, key: &TimelineKey) -> Result<Vec<Post>, Self::Error>;

    /// Atomically replace the stored list
    fn replace(&self, key: &TimelineKey, posts: &[Post]) -> Result<(), Self::Error>;

    /// Remove the stored list
    fn clear(&self, key: &TimelineKey) -> Result<(), Self::Error>;
}
