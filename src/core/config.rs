//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{AcError, Result};

/// Sidecar file written next to training output by the image reporter.
pub const DEFAULT_SIDECAR_NAME: &str = ".chainerui_images";

/// Full collector configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub collector: CollectorConfig,
    pub watch: WatchConfig,
    pub paths: PathsConfig,
}

/// How a single collection pass locates its metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CollectorConfig {
    /// File name of the sidecar metadata inside each run directory.
    pub sidecar_name: String,
}

/// Polling loop knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WatchConfig {
    pub poll_interval_ms: u64,
}

/// Filesystem paths used by acol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub activity_log: PathBuf,
    pub activity_log_fallback: Option<PathBuf>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            sidecar_name: DEFAULT_SIDECAR_NAME.to_string(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[ACOL-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("acol").join("config.toml");
        let data = home_dir.join(".local").join("share").join("acol");
        Self {
            config_file: cfg,
            activity_log: data.join("activity.jsonl"),
            activity_log_fallback: None,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| AcError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(AcError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for log correlation.
    ///
    /// FNV-1a keeps the value stable across processes and toolchains.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Poll interval as a `Duration`.
    #[must_use]
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.watch.poll_interval_ms)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("ACOL_COLLECTOR_SIDECAR_NAME") {
            self.collector.sidecar_name = raw;
        }

        if let Some(raw) = lookup("ACOL_WATCH_POLL_INTERVAL_MS") {
            self.watch.poll_interval_ms = parse_env_u64("ACOL_WATCH_POLL_INTERVAL_MS", &raw)?;
        }

        if let Some(raw) = lookup("ACOL_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.collector.sidecar_name.as_str();
        if name.trim().is_empty() {
            return Err(AcError::InvalidConfig {
                details: "collector.sidecar_name must not be empty".to_string(),
            });
        }
        // Must name a file directly inside the run directory.
        let mut components = Path::new(name).components();
        let is_plain_file_name = matches!(
            (components.next(), components.next()),
            (Some(std::path::Component::Normal(_)), None)
        );
        if !is_plain_file_name {
            return Err(AcError::InvalidConfig {
                details: format!("collector.sidecar_name must be a plain file name, got {name:?}"),
            });
        }

        if self.watch.poll_interval_ms == 0 {
            return Err(AcError::InvalidConfig {
                details: "watch.poll_interval_ms must be > 0".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|error| AcError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{AcError, Config, DEFAULT_SIDECAR_NAME};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.collector.sidecar_name, DEFAULT_SIDECAR_NAME);
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let mut cfg = Config::default();
        cfg.watch.poll_interval_ms = 0;
        let err = cfg.validate().expect_err("expected interval error");
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn sidecar_name_with_directory_rejected() {
        let mut cfg = Config::default();
        cfg.collector.sidecar_name = "nested/.chainerui_images".to_string();
        let err = cfg.validate().expect_err("expected sidecar error");
        match err {
            AcError::InvalidConfig { details } => assert!(details.contains("plain file name")),
            other => panic!("unexpected error: {other}"),
        }

        cfg.collector.sidecar_name = "..".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_sidecar_name_rejected() {
        let mut cfg = Config::default();
        cfg.collector.sidecar_name = "   ".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("ACOL_COLLECTOR_SIDECAR_NAME", ".images.json"),
            ("ACOL_WATCH_POLL_INTERVAL_MS", "250"),
            ("ACOL_ACTIVITY_LOG", "/tmp/acol/custom.jsonl"),
        ]);

        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("env overrides should parse");

        assert_eq!(cfg.collector.sidecar_name, ".images.json");
        assert_eq!(cfg.watch.poll_interval_ms, 250);
        assert_eq!(
            cfg.paths.activity_log,
            PathBuf::from("/tmp/acol/custom.jsonl")
        );
    }

    #[test]
    fn env_invalid_interval_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("ACOL_WATCH_POLL_INTERVAL_MS", "soon")]);

        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("invalid interval should fail");
        match err {
            AcError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("ACOL_WATCH_POLL_INTERVAL_MS"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[collector]\nsidecar_name = \".run_images\"\n\n[watch]\npoll_interval_ms = 1500\n",
        )
        .unwrap();

        let cfg = Config::load(Some(&path)).expect("config should load");
        assert_eq!(cfg.collector.sidecar_name, ".run_images");
        assert_eq!(cfg.watch.poll_interval_ms, 1_500);
        assert_eq!(cfg.paths.config_file, path);
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(Some(Path::new("/nonexistent/acol/config.toml")));
        assert!(matches!(result, Err(AcError::MissingConfig { .. })));
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let before = cfg.stable_hash().expect("hash should compute");
        let mut modified = Config::default();
        modified.watch.poll_interval_ms += 1;
        let after = modified.stable_hash().expect("hash should compute");
        assert_ne!(before, after);
        assert_eq!(before, cfg.stable_hash().expect("hash should compute"));
    }
}
