//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use asset_collector::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{AcError, Result};

// Collector
pub use crate::collector::record::{AssetRecord, ContentItem};
pub use crate::collector::run::{ResultDir, TrainingRun};
pub use crate::collector::source::{ContentSource, CountingSource, FsSource};
pub use crate::collector::{AssetCollector, CollectStats, Collection, collect_assets};

// Watch
pub use crate::watch::poller::{AssetPoller, PollOutcome, RunOutcome};
pub use crate::watch::signals::ShutdownSignal;
