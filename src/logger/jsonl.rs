//! JSONL activity log: one self-contained JSON object per line.
//!
//! Each line is built in memory and handed to `write_all` in one call so a
//! dashboard tailing the file never sees half a line.
//!
//! Degradation chain, one step per failure:
//! 1. Primary file path
//! 2. Fallback path, when configured
//! 3. stderr with `[ACOL-JSONL]` prefix
//! 4. Silent discard (collection must never fail because logging did)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::collector::CollectStats;
use crate::core::errors::{AcError, Result};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Activity event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    WatchStart,
    WatchStop,
    RunTracked,
    RunUntracked,
    CollectComplete,
    CollectFailed,
    MetadataAbsent,
}

/// A single JSONL log entry. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Run directory concerned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reused: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fresh: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropped: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_read: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// ACOL error code when the action failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            path: None,
            entries: None,
            reused: None,
            fresh: None,
            dropped: None,
            bytes_read: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }

    /// Entry for a finished collection pass.
    pub fn collected(path: &Path, stats: &CollectStats, duration_ms: u64) -> Self {
        let event = if stats.metadata_present {
            EventType::CollectComplete
        } else {
            EventType::MetadataAbsent
        };
        Self {
            path: Some(path.display().to_string()),
            entries: Some(stats.entries),
            reused: Some(stats.reused),
            fresh: Some(stats.fresh),
            dropped: Some(stats.dropped),
            bytes_read: Some(stats.content_bytes_read),
            duration_ms: Some(duration_ms),
            ok: Some(true),
            ..Self::new(event, Severity::Info)
        }
    }

    /// Entry for a collection pass that returned an error.
    pub fn failed(path: &Path, error: &AcError) -> Self {
        let severity = if error.is_retryable() {
            Severity::Warning
        } else {
            Severity::Critical
        };
        Self {
            path: Some(path.display().to_string()),
            ok: Some(false),
            error_code: Some(error.code().to_string()),
            error_message: Some(error.to_string()),
            ..Self::new(EventType::CollectFailed, severity)
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.display().to_string());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Primary,
    Fallback,
    Stderr,
    Discard,
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    /// Size at which the current file is rotated to `<path>.1`. Default: 16 MiB.
    pub max_size_bytes: u64,
    /// Rotated files kept. Default: 3.
    pub max_rotated_files: u32,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("activity.jsonl"),
            fallback_path: None,
            max_size_bytes: 16 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

impl JsonlConfig {
    /// Writer settings for the configured activity log paths.
    pub fn from_paths(config: &crate::core::config::PathsConfig) -> Self {
        Self {
            path: config.activity_log.clone(),
            fallback_path: config.activity_log_fallback.clone(),
            ..Self::default()
        }
    }
}

/// Append-only JSONL writer with rotation and fallback.
pub struct JsonlWriter {
    config: JsonlConfig,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    bytes_written: u64,
}

impl JsonlWriter {
    /// Open the log. Never fails; falls down the degradation chain instead.
    pub fn open(config: JsonlConfig) -> Self {
        let mut w = Self {
            config,
            writer: None,
            state: WriterState::Discard,
            bytes_written: 0,
        };
        w.open_primary();
        w
    }

    /// Writer that drops every entry.
    pub fn discard() -> Self {
        Self {
            config: JsonlConfig::default(),
            writer: None,
            state: WriterState::Discard,
            bytes_written: 0,
        }
    }

    /// Append one entry as one line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => self.write_line(&format!("{json}\n")),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[ACOL-JSONL] serialize error: {e}");
            }
        }
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::Primary => "primary",
            WriterState::Fallback => "fallback",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    // ──────────────────────── internals ────────────────────────

    fn active_path(&self) -> Option<&Path> {
        match self.state {
            WriterState::Primary => Some(&self.config.path),
            WriterState::Fallback => self.config.fallback_path.as_deref(),
            WriterState::Stderr | WriterState::Discard => None,
        }
    }

    fn write_line(&mut self, line: &str) {
        if self.writer.is_some()
            && self.bytes_written + line.len() as u64 > self.config.max_size_bytes
        {
            self.rotate();
        }

        match self.state {
            WriterState::Primary | WriterState::Fallback => {
                let written = self
                    .writer
                    .as_mut()
                    .is_some_and(|w| w.write_all(line.as_bytes()).is_ok());
                if written {
                    self.bytes_written += line.len() as u64;
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                let _ = write!(io::stderr(), "[ACOL-JSONL] {line}");
            }
            WriterState::Discard => {}
        }
    }

    fn open_primary(&mut self) {
        if let Ok((file, size)) = open_append(&self.config.path) {
            self.attach(file, size, WriterState::Primary);
        } else {
            self.open_fallback();
        }
    }

    fn open_fallback(&mut self) {
        let opened = self
            .config
            .fallback_path
            .as_deref()
            .and_then(|fb| open_append(fb).ok());
        if let Some((file, size)) = opened {
            let _ = writeln!(
                io::stderr(),
                "[ACOL-JSONL] primary path failed, using fallback"
            );
            self.attach(file, size, WriterState::Fallback);
        } else {
            let _ = writeln!(
                io::stderr(),
                "[ACOL-JSONL] no writable log file, using stderr"
            );
            self.writer = None;
            self.state = WriterState::Stderr;
        }
    }

    fn attach(&mut self, file: File, size: u64, state: WriterState) {
        self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
        self.state = state;
        self.bytes_written = size;
    }

    fn degrade(&mut self) {
        self.writer = None;
        match self.state {
            WriterState::Primary => self.open_fallback(),
            WriterState::Fallback => self.state = WriterState::Stderr,
            WriterState::Stderr | WriterState::Discard => self.state = WriterState::Discard,
        }
    }

    fn rotate(&mut self) {
        self.flush();
        self.writer = None;
        let Some(base) = self.active_path().map(Path::to_path_buf) else {
            return;
        };

        // <base>.N is the oldest kept; shift everything up by one.
        let _ = fs::remove_file(rotated_name(&base, self.config.max_rotated_files));
        for i in (1..self.config.max_rotated_files).rev() {
            let _ = fs::rename(rotated_name(&base, i), rotated_name(&base, i + 1));
        }
        let _ = fs::rename(&base, rotated_name(&base, 1));

        match open_append(&base) {
            Ok((file, _)) => {
                let state = self.state;
                self.attach(file, 0, state);
            }
            Err(_) => self.degrade(),
        }
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

// ──────────────────────── helpers ────────────────────────

/// Open or create a file for appending. Returns `(File, current_size)`.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| AcError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| AcError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// `activity.jsonl` → `activity.jsonl.2`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ──────────────────────── tests ────────────────────────
