//! Read-only master-data lookup tables.
//!
//! Label resolution only — nothing here influences scheduling decisions.
//! The surrounding system fills these maps before a run; unknown ids fall
//! back to the raw id so a missing lookup never breaks display fields.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Constructor-injected label lookups (detectors, columns, APIs).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MasterDataCatalog {
    detector_names: HashMap<String, String>,
    column_displays: HashMap<String, String>,
    api_names: HashMap<String, String>,
}

impl MasterDataCatalog {
    /// Creates an empty catalog (every lookup falls back to the id).
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a detector display name.
    pub fn with_detector(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.detector_names.insert(id.into(), name.into());
        self
    }

    /// Registers a column display string.
    pub fn with_column(mut self, code: impl Into<String>, display: impl Into<String>) -> Self {
        self.column_displays.insert(code.into(), display.into());
        self
    }

    /// Registers an API (formulation component) name.
    pub fn with_api(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.api_names.insert(id.into(), name.into());
        self
    }

    /// Detector display name, falling back to the id.
    pub fn detector_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.detector_names.get(id).map(String::as_str).unwrap_or(id)
    }

    /// Column display string, falling back to the code.
    pub fn column_display<'a>(&'a self, code: &'a str) -> &'a str {
        self.column_displays
            .get(code)
            .map(String::as_str)
            .unwrap_or(code)
    }

    /// API name, falling back to the id.
    pub fn api_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.api_names.get(id).map(String::as_str).unwrap_or(id)
    }
}
