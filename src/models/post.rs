//! Post/Status model and its display annotations

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deriving render identities from post ids
const RENDER_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_3c2e_9b7d_4e50_8c11_2f4a_d0e3_b97c);

/// Network-assigned post identifier.
///
/// Ids are opaque strings, but the server guarantees that a higher id is a newer
/// post. Ordering compares by length first and then lexicographically, which is the
/// numeric order for decimal ids such as Mastodon's snowflakes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    /// Create a post id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw id string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for PostId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for PostId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PostId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Position of a post inside a reconstructed reply chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyChainType {
    /// Not part of a chain in the current list
    #[default]
    Null,
    /// Oldest member of a chain
    Start,
    /// Interior member of a chain
    Continue,
    /// Newest member of a chain
    End,
}

impl ReplyChainType {
    /// Whether the post belongs to a chain at all
    pub const fn is_chained(&self) -> bool {
        !matches!(self, Self::Null)
    }
}

/// Display annotations computed by the reconciler and the thread builder.
///
/// These never touch the post payload and are always replaced as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    /// Position inside a reply chain
    pub reply_chain_type: ReplyChainType,
    /// The post replies to something that is not in the list
    pub has_unloaded_reply_status: bool,
    /// Replies above this post are hidden
    pub has_multi_reply_status: bool,
    /// False for elided chain members
    pub should_show: bool,
    /// Posts are missing between this one and the next older one
    pub has_unloaded_status: bool,
}

impl Default for Annotations {
    fn default() -> Self {
        Self {
            reply_chain_type: ReplyChainType::Null,
            has_unloaded_reply_status: false,
            has_multi_reply_status: false,
            should_show: true,
            has_unloaded_status: false,
        }
    }
}

impl Annotations {
    /// Drop everything the thread builder owns, keeping the gap marker
    pub const fn without_thread(self) -> Self {
        Self {
            reply_chain_type: ReplyChainType::Null,
            has_unloaded_reply_status: false,
            has_multi_reply_status: false,
            should_show: true,
            has_unloaded_status: self.has_unloaded_status,
        }
    }

    /// A lone reply whose parent is not loaded; it ends no visible chain
    pub const fn is_orphan_reply(&self) -> bool {
        matches!(self.reply_chain_type, ReplyChainType::End) && self.has_unloaded_reply_status
    }
}

/// A post/status on a timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Network-specific ID
    pub id: PostId,
    /// Reply-to post ID (if this is a reply)
    pub in_reply_to_id: Option<PostId>,
    /// Render identity, distinct for chain-anchor copies
    pub uuid: Uuid,
    /// Author handle
    pub author_handle: String,
    /// Author display name
    pub author_name: String,
    /// Post content (plain text, HTML stripped)
    pub content: String,
    /// When the post was created
    pub created_at: DateTime<Utc>,
    /// URL to the post on the web
    pub url: Option<String>,
    /// Whether this is a repost/boost
    pub is_repost: bool,
    /// Reposting author (if repost)
    pub repost_author: Option<String>,
    /// Number of likes/favorites
    pub like_count: u32,
    /// Number of reposts/boosts
    pub repost_count: u32,
    /// Number of replies
    pub reply_count: u32,
    /// Display annotations
    #[serde(default)]
    pub annotations: Annotations,
}

impl Post {
    /// Create a new post with an empty payload
    pub fn new(id: impl Into<PostId>) -> Self {
        let id = id.into();
        Self {
            uuid: Self::canonical_uuid(&id),
            id,
            in_reply_to_id: None,
            author_handle: String::new(),
            author_name: String::new(),
            content: String::new(),
            created_at: Utc::now(),
            url: None,
            is_repost: false,
            repost_author: None,
            like_count: 0,
            repost_count: 0,
            reply_count: 0,
            annotations: Annotations::default(),
        }
    }

    /// Set the parent post
    pub fn replying_to(mut self, parent: impl Into<PostId>) -> Self {
        self.in_reply_to_id = Some(parent.into());
        self
    }

    /// Render identity of the original instance of a post
    pub fn canonical_uuid(id: &PostId) -> Uuid {
        Uuid::new_v5(&RENDER_NAMESPACE, id.as_str().as_bytes())
    }

    /// Whether this post replies to another one
    pub const fn is_in_reply_to(&self) -> bool {
        self.in_reply_to_id.is_some()
    }

    /// Whether this instance is a synthetic chain-anchor copy
    pub fn is_anchor_copy(&self) -> bool {
        self.uuid != Self::canonical_uuid(&self.id)
    }

    /// Copy this post as the start of the chain ending at `terminal`
    pub fn anchor_copy(&self, terminal: &PostId) -> Self {
        let key = format!("{}>{}", self.id, terminal);
        Self {
            uuid: Uuid::new_v5(&RENDER_NAMESPACE, key.as_bytes()),
            annotations: Annotations::default(),
            ..self.clone()
        }
    }

    /// Replace the annotations
    pub fn with_annotations(self, annotations: Annotations) -> Self {
        Self {
            annotations,
            ..self
        }
    }

    /// Whether the post marks a pagination gap below it
    pub const fn has_gap_below(&self) -> bool {
        self.annotations.has_unloaded_status
    }

    /// Get a short preview of the content (for list display)
    pub fn preview(&self, max_len: usize) -> String {
        let content = self.content.replace('\n', " ");
        if content.chars().count() <= max_len {
            content
        } else {
            let cut: String = content.chars().take(max_len.saturating_sub(3)).collect();
            format!("{cut}...")
        }
    }

    /// Get relative time string (e.g., "5m", "2h", "3d")
    pub fn relative_time(&self) -> String {
        let duration = Utc::now().signed_duration_since(self.created_at);

        if duration.num_seconds() < 60 {
            format!("{}s", duration.num_seconds())
        } else if duration.num_minutes() < 60 {
            format!("{}m", duration.num_minutes())
        } else if duration.num_hours() < 24 {
            format!("{}h", duration.num_hours())
        } else if duration.num_days() < 7 {
            format!("{}d", duration.num_days())
        } else {
            self.created_at.format("%b %d").to_string()
        }
    }
}
