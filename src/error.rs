//! Error types for the timeline engine

use thiserror::Error;

use crate::models::PostId;

/// A page could not be fetched from the remote source
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request did not complete
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered with a non-success status
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },
    /// The response body was not a page of posts
    #[error("failed to decode page: {0}")]
    Decode(String),
}

/// A fetched page broke the page fetcher contract.
///
/// This is a data/programmer error: it is reported, never silently corrected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// Page ids are not strictly newest-first
    #[error("page is not sorted newest-first: {newer} is followed by {older}")]
    Unsorted {
        /// The id that should have been newer
        newer: PostId,
        /// The id that follows it
        older: PostId,
    },
    /// The same id appears twice in one page
    #[error("page contains post {0} more than once")]
    DuplicateId(PostId),
}

/// Why a timeline operation ended in the error state
#[derive(Debug, Error)]
pub enum TimelineError {
    /// Fetching the page failed (retryable)
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The fetched page was malformed
    #[error("reconciliation invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

impl TimelineError {
    /// Whether calling the operation again may succeed
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}

/// The timeline cache could not be read or written
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// `SQLite` failed
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored row did not decode
    #[error("corrupt cache entry: {0}")]
    Json(#[from] serde_json::Error),
}
