//! In-process timeline cache.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::{Post, TimelineKey};

use super::LocalCache;

/// Thread-safe in-memory cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    timelines: Mutex<HashMap<TimelineKey, Vec<Post>>>,
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn timelines(&self) -> MutexGuard<'_, HashMap<TimelineKey, Vec<Post>>> {
        self.timelines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of timelines with a stored list
    pub fn len(&self) -> usize {
        self.timelines().len()
    }

    /// Check if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.timelines().is_empty()
    }
}

impl LocalCache for MemoryCache {
    type Error = Infallible;

    fn load(&self, key: &TimelineKey) -> Result<Vec<Post>, Self::Error> {
        Ok(self.timelines().get(key).cloned().unwrap_or_default())
    }

    fn replace(&self, key: &TimelineKey, posts: &[Post]) -> Result<(), Self::Error> {
        self.timelines().insert(key.clone(), posts.to_vec());
        Ok(())
    }

    fn clear(&self, key: &TimelineKey) -> Result<(), Self::Error> {
        self.timelines().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimelineKind;

    #[test]
    fn test_replace_load_clear() {
        let cache = MemoryCache::new();
        let key = TimelineKey::new("example.social", TimelineKind::Home);
        let other = TimelineKey::new("example.social", TimelineKind::Local);

        assert!(cache.load(&key).unwrap().is_empty());

        cache.replace(&key, &[Post::new("2"), Post::new("1")]).unwrap();
        cache.replace(&other, &[Post::new("9")]).unwrap();
        assert_eq!(cache.len(), 2);

        let posts = cache.load(&key).unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id.as_str(), "2");

        cache.clear(&key).unwrap();
        assert!(cache.load(&key).unwrap().is_empty());
        assert_eq!(cache.load(&other).unwrap().len(), 1);
    }
}
