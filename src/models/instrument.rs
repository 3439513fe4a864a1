//! Instrument (HPLC machine) model.
//!
//! An instrument is a compatibility constraint, not a capacity constraint:
//! it drives a fixed set of detector types and has no throughput limit
//! other than the runtime ceiling the scheduler applies per assignment.

use serde::{Deserialize, Serialize};

/// A physical HPLC instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    /// Unique instrument identifier.
    pub id: String,
    /// Display name (e.g. "HPLC-03").
    #[serde(default)]
    pub name: String,
    /// Whether the instrument is active and available for assignment.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Detector type identifiers this instrument can drive.
    #[serde(default)]
    pub detectors: Vec<String>,
}

fn default_active() -> bool {
    true
}

impl Instrument {
    /// Creates an active instrument with no detectors.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            active: true,
            detectors: Vec::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Adds a supported detector type.
    pub fn with_detector(mut self, detector_id: impl Into<String>) -> Self {
        self.detectors.push(detector_id.into());
        self
    }

    /// Whether this instrument can drive the given detector type.
    pub fn supports_detector(&self, detector_id: &str) -> bool {
        self.detectors.iter().any(|d| d == detector_id)
    }

    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_support() {
        let inst = Instrument::new("I1")
            .with_name("HPLC-01")
            .with_detector("UV")
            .with_detector("RI");

        assert!(inst.supports_detector("UV"));
        assert!(inst.supports_detector("RI"));
        assert!(!inst.supports_detector("FLD"));
        assert!(inst.active);
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(Instrument::new("I1").display_name(), "I1");
        assert_eq!(Instrument::new("I1").with_name("HPLC-01").display_name(), "HPLC-01");
    }
}
