//! Label index catalog
//!
//! Score row `i` of the network means label `i` of the catalog. That
//! correspondence is established when features are generated and must be
//! reproduced exactly at serving time, so the catalog can be built two
//! ways: derived from manifest class names (sorted, distinct), or loaded
//! verbatim from a JSON file written at generation time. The JSON form is
//! a bare array of names; order is meaning, never re-sort it.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelCatalog {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelCatalog {
    /// Build a catalog from manifest class names: distinct values in
    /// ascending lexicographic order. Repetitions across rows are expected
    /// and collapse; the result is the canonical training label order.
    pub fn from_manifest_classes<I, S>(classes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let distinct: BTreeSet<String> = classes.into_iter().map(Into::into).collect();
        Self::from_names(distinct.into_iter().collect())
    }

    /// Build a catalog from an explicit name list, preserving order.
    /// Duplicates make the label-to-index mapping ambiguous and are
    /// rejected.
    pub fn from_names(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::Configuration(
                "label catalog must contain at least one label".into(),
            ));
        }
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(Error::Configuration(format!(
                    "duplicate label {name:?} in catalog"
                )));
            }
        }
        Ok(Self { names, index })
    }

    /// Load a catalog persisted by [`LabelCatalog::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            Error::Configuration(format!("invalid label catalog {}: {e}", path.display()))
        })
    }

    /// Persist as a JSON array of names in index order.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.names)
            .map_err(|e| Error::Configuration(format!("cannot serialize label catalog: {e}")))?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl TryFrom<Vec<String>> for LabelCatalog {
    type Error = Error;

    fn try_from(names: Vec<String>) -> Result<Self> {
        Self::from_names(names)
    }
}

impl From<LabelCatalog> for Vec<String> {
    fn from(catalog: LabelCatalog) -> Self {
        catalog.names
    }
}
