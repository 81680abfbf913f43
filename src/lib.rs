//! # BasaltKV
//!
//! A write-optimized, embedded key-value store with:
//! - LSM-tree storage (active memtable → frozen queue → on-disk segments)
//! - Background flush and compaction workers
//! - A single-threaded, readiness-driven RESP front end
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Event Loop (mio Poll)                      │
//! │              accept / read / decode / reply                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      RESP Codec                              │
//! │          (incremental decode, reply encoding)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      LsmEngine                               │
//! │    active memtable → frozen queue → segment list             │
//! └──────────┬──────────────────────────────┬───────────────────┘
//!            │                              │
//!            ▼                              ▼
//!     ┌─────────────┐               ┌───────────────┐
//!     │ Flush worker│               │  Compaction   │
//!     │ (→ segment) │               │    worker     │
//!     └─────────────┘               └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod memtable;
pub mod segment;
pub mod engine;
pub mod protocol;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BasaltError, Result};
pub use config::Config;
pub use engine::LsmEngine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of BasaltKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
