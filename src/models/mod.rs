//! Data models for Roost

mod post;
mod timeline;

pub use post::{Annotations, Post, PostId, ReplyChainType};
pub use timeline::{TimelineKey, TimelineKind};
