//! Offline demo feed
//!
//! A deterministic, in-memory [`PageFetcher`] used by `roost demo` and by tests.
//! The feed contains reply chains, sibling replies and replies to posts that are
//! not part of the feed, so every threading case shows up.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::DateTime;

use crate::api::PageFetcher;
use crate::error::FetchError;
use crate::models::{Post, PostId};

/// Posts in a default demo feed
pub const DEFAULT_FEED_LEN: usize = 60;

/// Ids start here so they all have the same width
const FIRST_ID: u64 = 1000;

/// Post timestamps start here (2023-11-14)
const EPOCH: i64 = 1_700_000_000;

const AUTHORS: &[(&str, &str)] = &[
    ("ana", "Ana Lima"),
    ("bo", "Bo Chen"),
    ("cleo", "Cleo Martin"),
    ("dev", "Dev Patel"),
    ("eli", "Eli Novak"),
];

const LINES: &[&str] = &[
    "Finally got the cache layer working offline.",
    "Anyone else seeing slow federation today?",
    "Coffee first, then code review.",
    "Reading about gap markers in timeline sync.",
    "New blog post is up, feedback welcome.",
    "The borrow checker was right again.",
    "Hiking this weekend if the weather holds.",
];

/// In-memory feed that pages like a Mastodon timeline
#[derive(Debug)]
pub struct DemoFetcher {
    /// Oldest first
    feed: Mutex<Vec<Post>>,
}

impl Default for DemoFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_LEN)
    }
}

impl DemoFetcher {
    /// Create a feed with `len` posts
    pub fn new(len: usize) -> Self {
        let fetcher = Self {
            feed: Mutex::new(Vec::with_capacity(len)),
        };
        fetcher.publish(len);
        fetcher
    }

    fn feed(&self) -> MutexGuard<'_, Vec<Post>> {
        self.feed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `count` posts newer than everything in the feed
    pub fn publish(&self, count: usize) -> Vec<PostId> {
        let mut feed = self.feed();
        let start = feed.len() as u64;

        (start..start + count as u64)
            .map(|n| {
                let post = demo_post(n);
                let id = post.id.clone();
                feed.push(post);
                id
            })
            .collect()
    }

    /// Number of posts in the feed
    pub fn len(&self) -> usize {
        self.feed().len()
    }

    /// Check if the feed is empty.
    pub fn is_empty(&self) -> bool {
        self.feed().is_empty()
    }

    /// Ids in the feed, newest first
    pub fn ids(&self) -> Vec<PostId> {
        self.feed().iter().rev().map(|post| post.id.clone()).collect()
    }
}

impl PageFetcher for DemoFetcher {
    async fn fetch_page(
        &self,
        cursor: Option<&PostId>,
        limit: usize,
    ) -> Result<Vec<Post>, FetchError> {
        let page: Vec<Post> = self
            .feed()
            .iter()
            .rev()
            .filter(|post| cursor.is_none_or(|cursor| &post.id < cursor))
            .take(limit)
            .cloned()
            .collect();

        tracing::debug!(
            "Demo page below {:?}: {} posts",
            cursor.map(PostId::as_str),
            page.len()
        );
        Ok(page)
    }
}

/// The `n`th post of the demo feed (0 is the oldest)
fn demo_post(n: u64) -> Post {
    let (handle, name) = AUTHORS[(n % AUTHORS.len() as u64) as usize];
    let line = LINES[(n % LINES.len() as u64) as usize];

    let mut post = Post::new((FIRST_ID + n).to_string());
    post.author_handle = handle.to_string();
    post.author_name = name.to_string();
    post.content = line.to_string();
    post.created_at = DateTime::from_timestamp(EPOCH + n as i64 * 90, 0).unwrap_or_default();
    post.like_count = (n * 7 % 13) as u32;
    post.repost_count = (n % 4) as u32;

    // Chains of consecutive replies, siblings, and replies to posts outside the feed
    let parent = match n % 10 {
        3 | 4 => Some(FIRST_ID + n - 1),
        7 if n >= 10 => Some(FIRST_ID + n - 4),
        9 => Some(FIRST_ID / 2 + n % 100),
        _ => None,
    };
    if let Some(parent) = parent {
        post.in_reply_to_id = Some(PostId::new(parent.to_string()));
        post.content = format!("@{} {}", AUTHORS[0].0, line);
    }

    post
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::cache::MemoryCache;
    use crate::models::{ReplyChainType, TimelineKey, TimelineKind};
    use crate::timeline::{LoadOutcome, MergeKind, Paginator};

    fn paginator(fetcher: DemoFetcher, page_size: usize) -> Paginator<DemoFetcher, MemoryCache> {
        Paginator::new(
            TimelineKey::new("demo.local", TimelineKind::Home),
            fetcher,
            Arc::new(MemoryCache::new()),
            page_size,
        )
    }

    #[tokio::test]
    async fn test_pages_are_newest_first_and_below_cursor() {
        let fetcher = DemoFetcher::new(10);

        let first = fetcher.fetch_page(None, 4).await.unwrap();
        let ids: Vec<&str> = first.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1009", "1008", "1007", "1006"]);

        let next = fetcher.fetch_page(Some(&first[3].id), 4).await.unwrap();
        assert_eq!(next[0].id.as_str(), "1005");

        let last = fetcher
            .fetch_page(Some(&PostId::from("1001")), 4)
            .await
            .unwrap();
        assert_eq!(last.len(), 1);
    }

    #[tokio::test]
    async fn test_publish_adds_newer_posts() {
        let fetcher = DemoFetcher::new(5);
        let added = fetcher.publish(2);

        assert_eq!(added, vec![PostId::from("1005"), PostId::from("1006")]);
        assert_eq!(fetcher.len(), 7);
        assert_eq!(fetcher.ids()[0], PostId::from("1006"));
    }

    #[test]
    fn test_feed_is_deterministic() {
        assert_eq!(demo_post(13), demo_post(13));
        assert_eq!(demo_post(4).in_reply_to_id, Some(PostId::from("1003")));
        assert!(demo_post(0).in_reply_to_id.is_none());
    }

    #[tokio::test]
    async fn test_paging_to_the_end_loads_every_post_once() {
        let paginator = paginator(DemoFetcher::new(23), 5);

        paginator.refresh().await;
        while !paginator.end_reached() {
            assert!(matches!(paginator.append().await, LoadOutcome::Loaded(_)));
        }

        let posts = paginator.posts();
        let unique: HashSet<&PostId> = posts
            .iter()
            .filter(|p| !p.is_anchor_copy())
            .map(|p| &p.id)
            .collect();
        assert_eq!(unique.len(), 23);
        assert_eq!(
            posts.iter().filter(|p| !p.is_anchor_copy()).count(),
            23,
            "no post is listed twice outside of chain anchors"
        );
        assert!(
            posts
                .iter()
                .any(|p| p.annotations.reply_chain_type == ReplyChainType::Start)
        );
    }

    #[tokio::test]
    async fn test_burst_of_new_posts_leaves_a_gap_that_can_be_filled() {
        let paginator = paginator(DemoFetcher::new(20), 5);

        paginator.refresh().await;
        paginator.append().await;
        paginator.fetcher().publish(12);

        assert_eq!(paginator.refresh().await, LoadOutcome::Loaded(MergeKind::Gap));
        let anchor = paginator
            .posts()
            .iter()
            .find(|p| p.has_gap_below())
            .map(|p| p.id.clone())
            .unwrap();

        let mut rounds = 0;
        let mut anchor = Some(anchor);
        while let Some(id) = anchor {
            assert!(matches!(paginator.load_gap(&id).await, LoadOutcome::Loaded(_)));
            anchor = paginator
                .posts()
                .iter()
                .find(|p| p.has_gap_below())
                .map(|p| p.id.clone());
            rounds += 1;
            assert!(rounds < 5);
        }

        let ids: HashSet<PostId> = paginator.posts().iter().map(|p| p.id.clone()).collect();
        for id in paginator.fetcher().ids().iter().take(22) {
            assert!(ids.contains(id), "post {id} missing after the gap was filled");
        }
    }
}
