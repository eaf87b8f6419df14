//! Remote page sources

pub mod mastodon;

use std::future::Future;

use crate::error::FetchError;
use crate::models::{Post, PostId};

/// A source of timeline pages
pub trait PageFetcher: Send + Sync + 'static {
    /// Fetch up to `limit` posts strictly older than `cursor`, newest first.
    ///
    /// With no cursor, returns the newest posts available.
    fn fetch_page(
        &self,
        cursor: Option<&PostId>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Post>, FetchError>> + Send;
}
