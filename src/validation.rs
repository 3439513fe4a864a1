//! Input validation for scheduling runs.
//!
//! Checks structural integrity of batches, tests, and instruments before
//! scheduling. Detects:
//! - Duplicate IDs
//! - Instruments with no detector capability
//! - Tests missing the fields placement depends on
//! - Mobile-phase code counts outside the method range
//!
//! Validation is advisory: the engine itself degrades gracefully (a bad
//! test goes to the hold pool with a reason), so callers run these checks
//! to surface data problems early, not to gate a run.

use crate::models::{Batch, Instrument};
use std::collections::HashSet;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// An active instrument drives no detector type.
    NoDetectorCapability,
    /// A test is missing its detector id or column code.
    IncompleteMethod,
    /// A test declares no mobile phases, or more than the method allows.
    InvalidMobilePhases,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Maximum mobile-phase codes a method may declare.
const MAX_MOBILE_PHASES: usize = 6;

/// Validates batches and instruments ahead of a scheduling run.
///
/// Checks:
/// 1. No duplicate batch IDs
/// 2. No duplicate test IDs (across all batches)
/// 3. No duplicate instrument IDs
/// 4. Every active instrument drives at least one detector
/// 5. Every schedulable test carries a column code and detector id
/// 6. Every schedulable test declares 1..=6 mobile-phase codes
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_input(batches: &[Batch], instruments: &[Instrument]) -> ValidationResult {
    let mut errors = Vec::new();

    let mut instrument_ids = HashSet::new();
    for instrument in instruments {
        if !instrument_ids.insert(instrument.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate instrument ID: {}", instrument.id),
            ));
        }
        if instrument.active && instrument.detectors.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::NoDetectorCapability,
                format!("Instrument '{}' drives no detector type", instrument.id),
            ));
        }
    }

    let mut batch_ids = HashSet::new();
    let mut test_ids = HashSet::new();
    for batch in batches {
        if !batch_ids.insert(batch.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate batch ID: {}", batch.id),
            ));
        }

        for test in &batch.tests {
            if !test_ids.insert(test.id.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::DuplicateId,
                    format!("Duplicate test ID: {}", test.id),
                ));
            }
            if !test.is_schedulable() {
                continue;
            }
            if !test.has_complete_method() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::IncompleteMethod,
                    format!("Test '{}' is missing its column code or detector id", test.id),
                ));
            }
            let phases = test.mobile_phases.len();
            if phases == 0 || phases > MAX_MOBILE_PHASES {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidMobilePhases,
                    format!(
                        "Test '{}' declares {} mobile phases (expected 1..={})",
                        test.id, phases, MAX_MOBILE_PHASES
                    ),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InjectionCounts, Test, TestStatus};

    fn valid_test(id: &str, batch: &str) -> Test {
        Test::new(id, batch)
            .with_method("C18", "UV")
            .with_mobile_phases(["MP-A"])
            .with_shared_runtime(5.0)
            .with_counts(InjectionCounts {
                sample: 3,
                ..Default::default()
            })
    }

    fn valid_instrument(id: &str) -> Instrument {
        Instrument::new(id).with_detector("UV")
    }

    #[test]
    fn test_valid_input() {
        let batches = vec![Batch::new("B1").with_test(valid_test("T1", "B1"))];
        let instruments = vec![valid_instrument("I1")];
        assert!(validate_input(&batches, &instruments).is_ok());
    }

    #[test]
    fn test_duplicate_ids_detected() {
        let batches = vec![
            Batch::new("B1").with_test(valid_test("T1", "B1")),
            Batch::new("B1").with_test(valid_test("T1", "B1")),
        ];
        let instruments = vec![valid_instrument("I1"), valid_instrument("I1")];

        let errors = validate_input(&batches, &instruments).unwrap_err();
        let duplicates = errors
            .iter()
            .filter(|e| e.kind == ValidationErrorKind::DuplicateId)
            .count();
        assert_eq!(duplicates, 3); // batch + test + instrument
    }

    #[test]
    fn test_detectorless_instrument_flagged() {
        let errors = validate_input(&[], &[Instrument::new("I1")]).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::NoDetectorCapability));

        // Inactive instruments are exempt.
        assert!(validate_input(&[], &[Instrument::new("I2").with_active(false)]).is_ok());
    }

    #[test]
    fn test_incomplete_method_flagged() {
        let batches = vec![Batch::new("B1").with_test(
            Test::new("T1", "B1").with_mobile_phases(["MP-A"]),
        )];
        let errors = validate_input(&batches, &[]).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::IncompleteMethod));
    }

    #[test]
    fn test_completed_tests_exempt_from_method_checks() {
        let batches = vec![Batch::new("B1")
            .with_test(Test::new("T1", "B1").with_status(TestStatus::Completed))];
        assert!(validate_input(&batches, &[]).is_ok());
    }

    #[test]
    fn test_mobile_phase_range_enforced() {
        let too_many = valid_test("T1", "B1")
            .with_mobile_phases(["A", "B", "C", "D", "E", "F", "G"]);
        let none = valid_test("T2", "B1").with_mobile_phases(Vec::<String>::new());
        let batches = vec![Batch::new("B1").with_test(too_many).with_test(none)];

        let errors = validate_input(&batches, &[]).unwrap_err();
        let phase_errors = errors
            .iter()
            .filter(|e| e.kind == ValidationErrorKind::InvalidMobilePhases)
            .count();
        assert_eq!(phase_errors, 2);
    }
}
