//! Incremental asset collection: sidecar metadata, record building, position-based reuse.
//!
//! A collection pass reads the sidecar of one run directory and walks its
//! entries by position. A position already covered by the previous result is
//! reused as-is (same `Arc`, no file reads). Every other position is built
//! fresh by reading its image files. The result always has exactly one record
//! per current entry.
//!
//! A sidecar shorter than the previous result was replaced, not appended to,
//! so none of the previous records can be matched to it: every entry is built
//! fresh and all previous records count as dropped.
//!
//! Otherwise reuse trusts the position alone. If the producer rewrites an
//! earlier entry or its image in place without shrinking the file, the stale
//! record is kept until the previous list is discarded.

pub mod metadata;
pub mod record;
pub mod run;
pub mod source;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::core::config::{CollectorConfig, DEFAULT_SIDECAR_NAME};
use crate::core::errors::{AcError, Result};

use self::metadata::{MetadataEntry, read_sidecar};
use self::record::{AssetRecord, ContentItem};
use self::run::ResultDir;
use self::source::{ContentSource, FsSource};

/// Counters describing one collection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectStats {
    /// Entries in the sidecar (and records in the result).
    pub entries: usize,
    /// Records carried over from the previous result.
    pub reused: usize,
    /// Records built from disk during this pass.
    pub fresh: usize,
    /// Previous records with no current entry.
    pub dropped: usize,
    /// Image bytes read for fresh records.
    pub content_bytes_read: u64,
    /// False when the sidecar file does not exist.
    pub metadata_present: bool,
}

/// Result of [`AssetCollector::collect_with_stats`].
#[derive(Debug, Clone)]
pub struct Collection {
    /// One record per current sidecar entry, in file order.
    pub records: Vec<Arc<AssetRecord>>,
    /// Counters for the pass that produced `records`.
    pub stats: CollectStats,
}

/// Builds asset records for run directories.
#[derive(Debug, Clone)]
pub struct AssetCollector<S = FsSource> {
    sidecar_name: String,
    source: S,
}

impl AssetCollector<FsSource> {
    /// Collector reading `.chainerui_images` from the local filesystem.
    pub fn new() -> Self {
        Self::with_source(DEFAULT_SIDECAR_NAME, FsSource)
    }

    /// Collector reading the configured sidecar name from the local filesystem.
    pub fn from_config(config: &CollectorConfig) -> Self {
        Self::with_source(config.sidecar_name.clone(), FsSource)
    }
}

impl Default for AssetCollector<FsSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ContentSource> AssetCollector<S> {
    /// Collector reading `sidecar_name` and image files through `source`.
    pub fn with_source(sidecar_name: impl Into<String>, source: S) -> Self {
        Self {
            sidecar_name: sidecar_name.into(),
            source,
        }
    }

    /// File name of the sidecar inside each run directory.
    pub fn sidecar_name(&self) -> &str {
        &self.sidecar_name
    }

    /// Content source used for image reads.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Bring `previous` up to date with the sidecar in `base_dir`.
    ///
    /// `previous` is never modified; the returned list is always new.
    pub fn collect(
        &self,
        base_dir: &Path,
        previous: &[Arc<AssetRecord>],
    ) -> Result<Vec<Arc<AssetRecord>>> {
        self.collect_with_stats(base_dir, previous)
            .map(|collection| collection.records)
    }

    /// Same as [`collect`](Self::collect) for a persisted run.
    pub fn collect_for<R: ResultDir + ?Sized>(
        &self,
        run: &R,
        previous: &[Arc<AssetRecord>],
    ) -> Result<Vec<Arc<AssetRecord>>> {
        self.collect(run.path_name(), previous)
    }

    /// Collect and report what was reused, built and dropped.
    pub fn collect_with_stats(
        &self,
        base_dir: &Path,
        previous: &[Arc<AssetRecord>],
    ) -> Result<Collection> {
        let Some(entries) = read_sidecar(base_dir, &self.sidecar_name)? else {
            return Ok(Collection {
                records: Vec::new(),
                stats: CollectStats {
                    dropped: previous.len(),
                    ..CollectStats::default()
                },
            });
        };

        // Shrunk sidecar: rebuild everything.
        let reusable: &[Arc<AssetRecord>] = if entries.len() < previous.len() {
            &[]
        } else {
            previous
        };

        let mut stats = CollectStats {
            entries: entries.len(),
            dropped: previous.len() - reusable.len(),
            metadata_present: true,
            ..CollectStats::default()
        };

        let mut records = Vec::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if let Some(existing) = reusable.get(position) {
                records.push(Arc::clone(existing));
                stats.reused += 1;
                continue;
            }
            let record = self.build_record(base_dir, entry)?;
            stats.content_bytes_read += record.content_bytes();
            stats.fresh += 1;
            records.push(Arc::new(record));
        }

        Ok(Collection { records, stats })
    }

    fn build_record(&self, base_dir: &Path, entry: &MetadataEntry) -> Result<AssetRecord> {
        let summary = entry.summary()?;
        let content_list = entry
            .images
            .iter()
            .map(|image| {
                let path = base_dir.join(&image.name);
                let content = self
                    .source
                    .read(&path)
                    .map_err(|e| AcError::content_read(&path, e))?;
                Ok(ContentItem {
                    name: image.name.clone(),
                    tag: image.tag.clone(),
                    content,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(AssetRecord {
            summary,
            content_list,
        })
    }
}

/// Collect with the default sidecar name from the local filesystem.
pub fn collect_assets(
    base_dir: &Path,
    previous: &[Arc<AssetRecord>],
) -> Result<Vec<Arc<AssetRecord>>> {
    AssetCollector::new().collect(base_dir, previous)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::source::CountingSource;
    use super::*;

    fn write_run(dir: &Path) {
        fs::write(dir.join("a.png"), b"A").unwrap();
        fs::write(dir.join("b.png"), b"BB").unwrap();
        fs::write(
            dir.join(DEFAULT_SIDECAR_NAME),
            r#"[{"iteration": 1, "epoch": 0, "images": {"x": "a.png"}},
                {"iteration": 2, "epoch": 0, "images": {"y": "b.png"}}]"#,
        )
        .unwrap();
    }

    #[test]
    fn stats_track_fresh_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path());
        let collector = AssetCollector::new();

        let first = collector.collect_with_stats(dir.path(), &[]).unwrap();
        assert_eq!(
            first.stats,
            CollectStats {
                entries: 2,
                reused: 0,
                fresh: 2,
                dropped: 0,
                content_bytes_read: 3,
                metadata_present: true,
            }
        );

        let second = collector
            .collect_with_stats(dir.path(), &first.records)
            .unwrap();
        assert_eq!(second.stats.reused, 2);
        assert_eq!(second.stats.fresh, 0);
        assert_eq!(second.stats.content_bytes_read, 0);
    }

    #[test]
    fn absent_sidecar_drops_everything() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path());
        let collector = AssetCollector::new();
        let first = collector.collect(dir.path(), &[]).unwrap();

        fs::remove_file(dir.path().join(DEFAULT_SIDECAR_NAME)).unwrap();
        let second = collector.collect_with_stats(dir.path(), &first).unwrap();
        assert!(second.records.is_empty());
        assert!(!second.stats.metadata_present);
        assert_eq!(second.stats.dropped, 2);
    }

    #[test]
    fn shrunk_sidecar_rebuilds_every_record() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path());
        let collector =
            AssetCollector::with_source(DEFAULT_SIDECAR_NAME, CountingSource::new(FsSource));
        let first = collector.collect(dir.path(), &[]).unwrap();

        fs::write(
            dir.path().join(DEFAULT_SIDECAR_NAME),
            r#"[{"iteration": 5, "epoch": 1, "images": {"y": "b.png"}}]"#,
        )
        .unwrap();
        collector.source().reset();
        let second = collector.collect_with_stats(dir.path(), &first).unwrap();

        assert_eq!(
            second.stats,
            CollectStats {
                entries: 1,
                reused: 0,
                fresh: 1,
                dropped: 2,
                content_bytes_read: 2,
                metadata_present: true,
            }
        );
        assert_eq!(collector.source().reads(), 1);
        assert!(!Arc::ptr_eq(&first[0], &second.records[0]));
        assert_eq!(second.records[0].summary, r#"{"iteration":5,"epoch":1}"#);
        assert_eq!(second.records[0].content_list[0].content, b"BB");
    }

    #[test]
    fn custom_sidecar_name_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path());
        fs::rename(
            dir.path().join(DEFAULT_SIDECAR_NAME),
            dir.path().join(".images.json"),
        )
        .unwrap();

        let default = AssetCollector::new();
        assert!(default.collect(dir.path(), &[]).unwrap().is_empty());

        let custom = AssetCollector::from_config(&CollectorConfig {
            sidecar_name: ".images.json".to_string(),
        });
        assert_eq!(custom.collect(dir.path(), &[]).unwrap().len(), 2);
    }

    #[test]
    fn missing_image_aborts_whole_pass() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path());
        fs::remove_file(dir.path().join("b.png")).unwrap();

        let collector = AssetCollector::with_source(
            DEFAULT_SIDECAR_NAME,
            CountingSource::new(FsSource),
        );
        let err = collector.collect(dir.path(), &[]).unwrap_err();
        assert_eq!(err.code(), "ACOL-2002");
        assert!(err.to_string().contains("b.png"));
        assert_eq!(collector.source().reads(), 2);
    }

    #[test]
    fn free_function_uses_default_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path());
        let records = collect_assets(dir.path(), &[]).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].content_list[0].content, b"BB");
    }
}
