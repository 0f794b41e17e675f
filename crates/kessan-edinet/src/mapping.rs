//! Security code to EDINET code mapping.
//!
//! The mapping file is a JSON array maintained by hand:
//!
//! ```json
//! [{ "code": "7203", "edinet_code": "E02144", "fiscal_year_end": "03-31" }]
//! ```

use kessan_core::{DataError, FiscalYearEnd, Result, SecurityCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// One row of the mapping file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMappingEntry {
    /// TSE security code.
    pub code: String,
    /// EDINET filer code (`E02144`).
    #[serde(default)]
    pub edinet_code: Option<String>,
    /// Fiscal year end as `MM-DD`.
    #[serde(default)]
    pub fiscal_year_end: Option<FiscalYearEnd>,
    /// Company name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Lookup table from security code to EDINET metadata.
#[derive(Clone, Debug, Default)]
pub struct CodeMapping {
    entries: HashMap<SecurityCode, CodeMappingEntry>,
}

impl CodeMapping {
    /// Parses a mapping from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let rows: Vec<CodeMappingEntry> = serde_json::from_str(json)
            .map_err(|e| DataError::Parse(format!("Failed to parse code mapping: {}", e)))?;
        Ok(rows.into_iter().collect())
    }

    /// Loads a mapping file.
    ///
    /// A missing or unreadable file yields an empty mapping.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                debug!("No code mapping at {}: {}", path.display(), e);
                return Self::default();
            }
        };
        Self::from_json(&text).unwrap_or_else(|e| {
            warn!("Ignoring code mapping {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Entry for a security code.
    #[must_use]
    pub fn get(&self, code: &SecurityCode) -> Option<&CodeMappingEntry> {
        self.entries.get(code)
    }

    /// EDINET filer code for a security code.
    #[must_use]
    pub fn edinet_code(&self, code: &SecurityCode) -> Option<&str> {
        self.get(code)?.edinet_code.as_deref()
    }

    /// Fiscal year end for a security code.
    #[must_use]
    pub fn fiscal_year_end(&self, code: &SecurityCode) -> Option<FiscalYearEnd> {
        self.get(code)?.fiscal_year_end
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, entry: CodeMappingEntry) {
        self.entries.insert(SecurityCode::new(entry.code.as_str()), entry);
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<CodeMappingEntry> for CodeMapping {
    fn from_iter<T: IntoIterator<Item = CodeMappingEntry>>(iter: T) -> Self {
        let mut mapping = Self::default();
        for entry in iter {
            mapping.insert(entry);
        }
        mapping
    }
}
