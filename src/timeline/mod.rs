//! Timeline engine: pagination, reconciliation and reply threading
//!
//! ```text
//!  refresh()/append()/load_gap()
//!            │
//!            ▼
//!     ┌─────────────┐  fetch_page   ┌──────────────┐
//!     │  Paginator  │──────────────▶│ PageFetcher  │
//!     └─────────────┘               └──────────────┘
//!            │ page
//!            ▼
//!     ┌─────────────┐  load/replace ┌──────────────┐
//!     │  reconcile  │◀─────────────▶│  LocalCache  │
//!     └─────────────┘               └──────────────┘
//!            │ merged, flat
//!            ▼
//!     ┌─────────────┐
//!     │build_threads│──▶ observable list
//!     └─────────────┘
//! ```

mod paginator;
pub mod reconcile;
mod registry;
mod thread;

pub use paginator::{LoadOutcome, LoadState, Paginator};
pub use reconcile::{MergeKind, Merged};
pub use registry::TimelineRegistry;
pub use thread::build_threads;
