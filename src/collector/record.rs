//! Collected asset records.

#![allow(missing_docs)]

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::core::errors::Result;

/// One image file read for a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    /// Filename as written in the sidecar.
    pub name: String,
    /// Mapping key the filename was listed under.
    pub tag: String,
    /// Raw bytes as read at collection time.
    pub content: Vec<u8>,
}

impl ContentItem {
    /// Lowercase hex SHA-256 of the content.
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(&self.content);
        let mut out = String::with_capacity(hash.len() * 2);
        for byte in hash {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

/// Summary plus content for one sidecar entry. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    /// JSON object text with every entry field except `images`.
    pub summary: String,
    pub content_list: Vec<ContentItem>,
}

impl AssetRecord {
    /// Decode the summary back into a JSON value.
    pub fn summary_value(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.summary)?)
    }

    /// Total content bytes held by this record.
    pub fn content_bytes(&self) -> u64 {
        self.content_list
            .iter()
            .map(|item| item.content.len() as u64)
            .sum()
    }

    /// Report view without raw bytes.
    pub fn report(&self) -> Result<RecordReport> {
        Ok(RecordReport {
            summary: self.summary_value()?,
            content_list: self
                .content_list
                .iter()
                .map(|item| ContentReport {
                    name: item.name.clone(),
                    tag: item.tag.clone(),
                    size_bytes: item.content.len() as u64,
                    sha256: item.digest(),
                })
                .collect(),
        })
    }
}

/// Serializable view of a record for CLI output.
#[derive(Debug, Clone, Serialize)]
pub struct RecordReport {
    pub summary: Value,
    pub content_list: Vec<ContentReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentReport {
    pub name: String,
    pub tag: String,
    pub size_bytes: u64,
    pub sha256: String,
}
