//! Shutdown signalling for the watch loop.
//!
//! SIGINT/SIGTERM set a shared flag via `signal-hook`; the loop polls it
//! between cycles and while sleeping.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared shutdown flag.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Flag that only trips when [`request`](Self::request) is called.
    pub fn manual() -> Self {
        Self::default()
    }

    /// Flag that also trips on SIGINT and SIGTERM.
    ///
    /// Registration is best-effort; failures are reported on stderr.
    #[cfg(feature = "daemon")]
    pub fn with_os_signals() -> Self {
        use signal_hook::consts::{SIGINT, SIGTERM};

        let signal = Self::manual();
        for (name, sig) in [("SIGINT", SIGINT), ("SIGTERM", SIGTERM)] {
            if let Err(e) = signal_hook::flag::register(sig, Arc::clone(&signal.flag)) {
                eprintln!("[ACOL-SIGNAL] failed to register {name}: {e}");
            }
        }
        signal
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}
