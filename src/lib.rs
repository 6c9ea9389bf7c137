#![forbid(unsafe_code)]

//! Asset Collector (acol): incremental collection of the per-iteration images
//! a training run reports through its `.chainerui_images` sidecar.
//!
//! Each pass re-reads the sidecar and walks its entries by position:
//! 1. **Reuse**: positions covered by the previous result keep their record, no I/O
//! 2. **Read**: new positions get a summary plus the bytes of every listed image
//! 3. **Reset**: a sidecar shorter than the previous result was replaced, so
//!    every record is rebuilt and the previous ones are dropped
//!
//! # Library usage
//!
//! ```rust,no_run
//! use asset_collector::prelude::*;
//!
//! let first = collect_assets(std::path::Path::new("results/mnist"), &[])?;
//! let second = collect_assets(std::path::Path::new("results/mnist"), &first)?;
//! # Ok::<(), AcError>(())
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use asset_collector::collector::AssetCollector;
//! use asset_collector::watch::poller::AssetPoller;
//! ```

pub mod prelude;

pub mod collector;
pub mod core;
pub mod logger;
pub mod watch;
