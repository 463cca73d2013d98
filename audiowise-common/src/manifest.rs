//! Dataset manifest
//!
//! The manifest CSV is the bridge between raw audio, saved feature
//! artifacts and the training tooling. The column headers are a wire
//! format; renaming them breaks downstream consumers.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One manifest row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    /// Audio file name relative to the dataset root
    #[serde(rename = "Dataset File Name")]
    pub file_name: String,
    /// Ground-truth class label
    #[serde(rename = "Class Name")]
    pub class_name: String,
    /// Path of the saved feature artifact; empty when extraction failed
    pub spec_path: String,
}

pub fn read_manifest(path: &Path) -> Result<Vec<ManifestRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

pub fn write_manifest(path: &Path, records: &[ManifestRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
