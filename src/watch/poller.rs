//! Polling loop that keeps the asset records of tracked runs current.
//!
//! Each cycle collects every tracked run once, in path order. A failed pass
//! leaves that run's previous records untouched so the next cycle retries
//! from the last good state. Half-written sidecars or images from a running
//! trainer clear themselves up this way.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::collector::record::AssetRecord;
use crate::collector::run::{ResultDir, TrainingRun};
use crate::collector::source::{ContentSource, FsSource};
use crate::collector::{AssetCollector, CollectStats};
use crate::core::config::Config;
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use crate::watch::signals::ShutdownSignal;

/// Longest uninterrupted sleep between shutdown checks.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// What happened to one run during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Collected {
        stats: CollectStats,
    },
    Failed {
        error_code: &'static str,
        message: String,
        retryable: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub path: PathBuf,
    pub outcome: PollOutcome,
}

#[derive(Debug)]
struct TrackedRun {
    run: TrainingRun,
    records: Vec<Arc<AssetRecord>>,
    consecutive_failures: u32,
}

/// Owns the previous records of every tracked run and refreshes them on demand.
pub struct AssetPoller<S = FsSource> {
    collector: AssetCollector<S>,
    runs: BTreeMap<PathBuf, TrackedRun>,
    log: JsonlWriter,
    cycles: u64,
}

impl AssetPoller<FsSource> {
    /// Poller using the configured sidecar name and activity log.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            AssetCollector::from_config(&config.collector),
            JsonlWriter::open(JsonlConfig::from_paths(&config.paths)),
        )
    }
}

impl<S: ContentSource> AssetPoller<S> {
    pub fn new(collector: AssetCollector<S>, log: JsonlWriter) -> Self {
        Self {
            collector,
            runs: BTreeMap::new(),
            log,
            cycles: 0,
        }
    }

    pub fn collector(&self) -> &AssetCollector<S> {
        &self.collector
    }

    /// Start tracking a run. Returns false if its directory is already tracked.
    pub fn track(&mut self, run: TrainingRun) -> bool {
        let path = run.path_name().to_path_buf();
        if self.runs.contains_key(&path) {
            return false;
        }
        let details = run
            .id
            .map_or_else(|| "unpersisted".to_string(), |id| format!("id={id}"));
        self.log.write_entry(
            &LogEntry::new(EventType::RunTracked, Severity::Info)
                .with_path(&path)
                .with_details(details),
        );
        self.runs.insert(
            path,
            TrackedRun {
                run,
                records: Vec::new(),
                consecutive_failures: 0,
            },
        );
        true
    }

    /// Stop tracking a run, handing back its last records.
    pub fn untrack(&mut self, path: &Path) -> Option<Vec<Arc<AssetRecord>>> {
        let tracked = self.runs.remove(path)?;
        self.log
            .write_entry(&LogEntry::new(EventType::RunUntracked, Severity::Info).with_path(path));
        Some(tracked.records)
    }

    pub fn tracked(&self) -> impl Iterator<Item = &TrainingRun> {
        self.runs.values().map(|t| &t.run)
    }

    /// Latest good records for a run.
    pub fn records(&self, path: &Path) -> Option<&[Arc<AssetRecord>]> {
        self.runs.get(path).map(|t| t.records.as_slice())
    }

    pub fn consecutive_failures(&self, path: &Path) -> Option<u32> {
        self.runs.get(path).map(|t| t.consecutive_failures)
    }

    /// Completed cycles so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Collect every tracked run once.
    pub fn poll_once(&mut self) -> Vec<RunOutcome> {
        let mut outcomes = Vec::with_capacity(self.runs.len());
        for (path, tracked) in &mut self.runs {
            let started = Instant::now();
            let outcome = match self
                .collector
                .collect_with_stats(tracked.run.path_name(), &tracked.records)
            {
                Ok(collection) => {
                    let elapsed_ms =
                        u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    self.log
                        .write_entry(&LogEntry::collected(path, &collection.stats, elapsed_ms));
                    tracked.records = collection.records;
                    tracked.consecutive_failures = 0;
                    PollOutcome::Collected {
                        stats: collection.stats,
                    }
                }
                Err(error) => {
                    self.log.write_entry(&LogEntry::failed(path, &error));
                    tracked.consecutive_failures = tracked.consecutive_failures.saturating_add(1);
                    PollOutcome::Failed {
                        error_code: error.code(),
                        message: error.to_string(),
                        retryable: error.is_retryable(),
                    }
                }
            };
            outcomes.push(RunOutcome {
                path: path.clone(),
                outcome,
            });
        }
        self.cycles += 1;
        self.log.flush();
        outcomes
    }

    /// Poll until `signal` trips or `max_cycles` cycles have run.
    ///
    /// `on_cycle` sees each cycle's outcomes. Returns the number of cycles run.
    pub fn run_until_shutdown<F>(
        &mut self,
        signal: &ShutdownSignal,
        interval: Duration,
        max_cycles: Option<u64>,
        mut on_cycle: F,
    ) -> u64
    where
        F: FnMut(&[RunOutcome]),
    {
        let details = format!(
            "runs={} interval_ms={}",
            self.runs.len(),
            interval.as_millis()
        );
        self.log
            .write_entry(&LogEntry::new(EventType::WatchStart, Severity::Info).with_details(details));

        let mut ran: u64 = 0;
        while !signal.is_requested() && max_cycles.is_none_or(|max| ran < max) {
            let outcomes = self.poll_once();
            ran += 1;
            on_cycle(&outcomes);
            if max_cycles.is_some_and(|max| ran >= max) {
                break;
            }
            sleep_unless_shutdown(signal, interval);
        }

        let reason = if signal.is_requested() {
            "shutdown requested"
        } else {
            "cycle limit reached"
        };
        self.log.write_entry(
            &LogEntry::new(EventType::WatchStop, Severity::Info)
                .with_details(format!("{reason} after {ran} cycles")),
        );
        self.log.flush();
        ran
    }
}

fn sleep_unless_shutdown(signal: &ShutdownSignal, interval: Duration) {
    let deadline = Instant::now() + interval;
    loop {
        if signal.is_requested() {
            return;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        thread::sleep(remaining.min(SLEEP_SLICE));
    }
}
