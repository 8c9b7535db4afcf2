//! Storage Backend Abstraction
//!
//! This module provides the `RunStore` contract for run records and two
//! reference stores.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │    ExpertRuntime    │
//! └──────────┬──────────┘
//!            │
//! ┌──────────▼──────────┐
//! │      RunStore       │  <-- Trait
//! │      (async)        │
//! └──────────┬──────────┘
//!            │
//!     ┌──────┴──────┐
//!     │             │
//! ┌───▼────┐   ┌────▼───┐
//! │ Memory │   │  File  │
//! │ Store  │   │ Store  │
//! └────────┘   └────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use erk::checkpoint::backend::RunStoreBuilder;
//!
//! fn example() -> anyhow::Result<()> {
//!     let store = RunStoreBuilder::new("file")
//!         .with_base_path("/path/to/storage")
//!         .build()?;
//!     assert_eq!(store.backend_type(), "file");
//!     Ok(())
//! }
//! ```

mod memory_backend;
mod traits;

#[cfg(feature = "file-store")]
mod events_log;
#[cfg(feature = "file-store")]
mod file_backend;

pub use memory_backend::InMemoryRunStore;
pub use traits::*;

#[cfg(feature = "file-store")]
pub use events_log::EventsLog;
#[cfg(feature = "file-store")]
pub use file_backend::FileRunStore;
