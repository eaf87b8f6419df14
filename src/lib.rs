//! # Roost
//!
//! Offline-first Mastodon timelines: pagination, reconciliation and reply threading.
//!
//! ## Overview
//!
//! Roost keeps a local copy of every timeline you read. A refresh fetches the
//! newest page and merges it into the cached list; when the page does not reach
//! the cached posts a gap marker records the hole so it can be filled later.
//! Reply chains are grouped into contiguous blocks before the list is published.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CLI / SyncManager                       │
//! │      Opens timelines and triggers refresh, append, gaps     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  TimelineRegistry / Paginator               │
//! │   One fetch in flight per timeline, observable list/state   │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │   PageFetcher   │ │    reconcile    │ │   LocalCache    │
//! │                 │ │                 │ │                 │
//! │ • Mastodon      │ │ • Overlap       │ │ • SQLite        │
//! │ • Demo feed     │ │ • Gap markers   │ │ • In-memory     │
//! │                 │ │ • Threading     │ │                 │
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`api`]: Page sources (Mastodon)
//! - [`cache`]: Timeline cache trait and in-memory cache
//! - [`config`]: Configuration management
//! - [`db`]: `SQLite` timeline cache
//! - [`demo`]: Offline demo feed
//! - [`models`]: Data models (Post, `TimelineKey`)
//! - [`sync`]: Background refresh
//! - [`timeline`]: Paginator, reconciliation and threading
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use roost::cache::MemoryCache;
//! use roost::demo::DemoFetcher;
//! use roost::models::{TimelineKey, TimelineKind};
//! use roost::timeline::Paginator;
//!
//! #[tokio::main]
//! async fn main() {
//!     let key = TimelineKey::new("demo.local", TimelineKind::Home);
//!     let paginator = Paginator::new(key, DemoFetcher::default(), Arc::new(MemoryCache::new()), 20);
//!
//!     paginator.refresh().await;
//!     paginator.append().await;
//!     println!("{} posts", paginator.posts().len());
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/roost/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::unused_async)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::if_not_else)]
#![allow(clippy::single_match_else)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::trivially_copy_pass_by_ref)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::use_self)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::should_implement_trait)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::similar_names)]
#![allow(clippy::if_same_then_else)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::branches_sharing_code)]
#![allow(clippy::wrong_self_convention)]
#![allow(clippy::return_self_not_must_use)]

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod demo;
pub mod error;
pub mod models;
pub mod paths;
pub mod sync;
pub mod timeline;

// Re-export main types for convenience
pub use config::Config;
pub use db::Database;
pub use error::{DatabaseError, FetchError, InvariantViolation, TimelineError};
pub use models::{Post, PostId, TimelineKey, TimelineKind};
pub use timeline::{LoadOutcome, LoadState, Paginator, TimelineRegistry};

/// ASCII logo for the application
pub const LOGO: &str = r"
   ___                __
  / _ \___  ___  ___ / /_
 / , _/ _ \/ _ \(_-</ __/
/_/|_|\___/\___/___/\__/
";

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
