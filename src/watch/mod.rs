//! Watch mode: periodic re-collection of tracked runs with graceful shutdown.

pub mod poller;
pub mod signals;
