//! Sidecar metadata parsing.
//!
//! The sidecar is a JSON array written by the training process, one object
//! per reported iteration:
//!
//! ```json
//! [{"iteration": 1000, "epoch": 1, "images": {"0": "img1_1.png"}}]
//! ```
//!
//! Every key except `images` is carried into the record summary unchanged and
//! in file order (`serde_json` is built with `preserve_order`).

#![allow(missing_docs)]

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde_json::{Map, Number, Value};

use crate::core::errors::{AcError, Result};

/// Reserved key holding the tag → filename mapping.
pub const IMAGES_KEY: &str = "images";

/// One image reference: the mapping key and the file it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub tag: String,
    pub name: String,
}

/// One element of the sidecar array.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEntry {
    /// Any JSON number; integers and floats pass through as written.
    pub iteration: Number,
    pub epoch: Number,
    /// All top-level fields except `images`, in file order.
    pub fields: Map<String, Value>,
    /// Image references in mapping order.
    pub images: Vec<ImageRef>,
}

impl MetadataEntry {
    /// Validate one decoded sidecar object.
    ///
    /// `source` and `position` only feed error messages.
    pub fn from_object(
        mut object: Map<String, Value>,
        source: &Path,
        position: usize,
    ) -> Result<Self> {
        let iteration = required_number(&object, "iteration", source, position)?;
        let epoch = required_number(&object, "epoch", source, position)?;

        let images = match object.get(IMAGES_KEY) {
            Some(Value::Object(mapping)) => mapping
                .iter()
                .map(|(tag, name)| match name {
                    Value::String(name) => Ok(ImageRef {
                        tag: tag.clone(),
                        name: name.clone(),
                    }),
                    other => Err(AcError::metadata_parse(
                        source,
                        format!("entry {position}: image {tag:?} must name a file, got {other}"),
                    )),
                })
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                return Err(AcError::metadata_parse(
                    source,
                    format!("entry {position}: `images` must be an object, got {other}"),
                ));
            }
            None => {
                return Err(AcError::metadata_parse(
                    source,
                    format!("entry {position}: missing `images`"),
                ));
            }
        };

        // Rebuild instead of `remove` so the remaining keys keep their order.
        object = object
            .into_iter()
            .filter(|(key, _)| key != IMAGES_KEY)
            .collect();

        Ok(Self {
            iteration,
            epoch,
            fields: object,
            images,
        })
    }

    /// Serialized summary: every field except `images`.
    pub fn summary(&self) -> Result<String> {
        serde_json::to_string(&self.fields).map_err(|e| AcError::Serialization {
            context: "asset_summary",
            details: e.to_string(),
        })
    }
}

fn required_number(
    object: &Map<String, Value>,
    key: &str,
    source: &Path,
    position: usize,
) -> Result<Number> {
    match object.get(key) {
        Some(Value::Number(number)) => Ok(number.clone()),
        _ => Err(AcError::metadata_parse(
            source,
            format!("entry {position}: `{key}` must be present and a number"),
        )),
    }
}

/// Read and validate the sidecar file in `base_dir`.
///
/// Returns `Ok(None)` when the file does not exist: an untracked directory,
/// not a failure.
pub fn read_sidecar(base_dir: &Path, sidecar_name: &str) -> Result<Option<Vec<MetadataEntry>>> {
    let path = base_dir.join(sidecar_name);
    let raw = match fs::read(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AcError::io(&path, e)),
    };

    let objects: Vec<Map<String, Value>> = serde_json::from_slice(&raw)
        .map_err(|e| AcError::metadata_parse(&path, e.to_string()))?;

    objects
        .into_iter()
        .enumerate()
        .map(|(position, object)| MetadataEntry::from_object(object, &path, position))
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_sidecar(dir: &Path, body: &str) {
        fs::write(dir.join(".chainerui_images"), body).unwrap();
    }

    #[test]
    fn absent_sidecar_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let entries = read_sidecar(dir.path(), ".chainerui_images").unwrap();
        assert!(entries.is_none());
    }

    #[test]
    fn images_keep_mapping_order() {
        let dir = tempfile::tempdir().unwrap();
        write_sidecar(
            dir.path(),
            r#"[{"iteration": 10, "epoch": 1, "images": {"z": "z.png", "a": "a.png", "m": "m.png"}}]"#,
        );

        let entries = read_sidecar(dir.path(), ".chainerui_images")
            .unwrap()
            .unwrap();
        let tags: Vec<&str> = entries[0].images.iter().map(|i| i.tag.as_str()).collect();
        assert_eq!(tags, ["z", "a", "m"]);
    }

    #[test]
    fn summary_excludes_images_and_keeps_extra_fields_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_sidecar(
            dir.path(),
            r#"[{"iteration": 2000, "images": {"seg": "img2.png"}, "epoch": 2, "custom": "test"}]"#,
        );

        let entries = read_sidecar(dir.path(), ".chainerui_images")
            .unwrap()
            .unwrap();
        let summary = entries[0].summary().unwrap();
        assert_eq!(summary, r#"{"iteration":2000,"epoch":2,"custom":"test"}"#);
        assert_eq!(entries[0].iteration, Number::from(2000));
        assert_eq!(entries[0].epoch, Number::from(2));
    }

    #[test]
    fn non_integer_numbers_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        write_sidecar(
            dir.path(),
            r#"[{"iteration": 1000.0, "epoch": 1.5, "images": {"0": "a.png"}},
                {"iteration": 18446744073709551615, "epoch": 2, "images": {}}]"#,
        );

        let entries = read_sidecar(dir.path(), ".chainerui_images")
            .unwrap()
            .unwrap();
        assert_eq!(entries[0].epoch.as_f64(), Some(1.5));
        assert_eq!(entries[0].iteration.as_f64(), Some(1000.0));
        assert_eq!(
            entries[0].summary().unwrap(),
            r#"{"iteration":1000.0,"epoch":1.5}"#
        );
        assert_eq!(entries[1].iteration.as_u64(), Some(u64::MAX));
    }

    #[test]
    fn non_numeric_epoch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_sidecar(
            dir.path(),
            r#"[{"iteration": 1000, "epoch": "1", "images": {}}]"#,
        );

        let err = read_sidecar(dir.path(), ".chainerui_images").unwrap_err();
        assert!(err.to_string().contains("`epoch` must be present and a number"), "{err}");
    }

    #[test]
    fn malformed_json_is_metadata_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        write_sidecar(dir.path(), r#"[{"iteration": 1000, "epoch": 1, "images": {"#);

        let err = read_sidecar(dir.path(), ".chainerui_images").unwrap_err();
        assert_eq!(err.code(), "ACOL-2001");
    }

    #[test]
    fn missing_images_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_sidecar(dir.path(), r#"[{"iteration": 1000, "epoch": 1}]"#);

        let err = read_sidecar(dir.path(), ".chainerui_images").unwrap_err();
        assert!(err.to_string().contains("missing `images`"), "{err}");
    }

    #[test]
    fn non_string_filename_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_sidecar(
            dir.path(),
            r#"[{"iteration": 1000, "epoch": 1, "images": {"0": 7}}]"#,
        );

        let err = read_sidecar(dir.path(), ".chainerui_images").unwrap_err();
        assert!(matches!(err, AcError::MetadataParse { .. }));
    }

    #[test]
    fn missing_iteration_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_sidecar(dir.path(), r#"[{"epoch": 1, "images": {}}]"#);

        let err = read_sidecar(dir.path(), ".chainerui_images").unwrap_err();
        assert!(err.to_string().contains("iteration"), "{err}");
    }

    #[test]
    fn empty_array_yields_no_entries() {
        let dir = tempfile::tempdir().unwrap();
        write_sidecar(dir.path(), "[]");

        let entries = read_sidecar(dir.path(), ".chainerui_images")
            .unwrap()
            .unwrap();
        assert!(entries.is_empty());
    }
}
