//! Origin-API resolution.
//!
//! Batches keep their nested formulation-component → test-type tree even
//! after their tests are flattened into a linear list. Grouping and
//! labeling must not conflate tests that are textually identical but
//! belong to different components, so this module re-associates a
//! flattened test with the component it was generated from.
//!
//! # Matching Precedence
//!
//! 1. When several components produced structurally identical tests and a
//!    position hint is supplied, the hint indexes into the ordered list of
//!    matching candidates directly.
//! 2. Otherwise every candidate is scored additively: exact structural
//!    match +10, equal normalized mobile-phase set +5, shared pharmacopoeia
//!    reference +1, runtime within ±1 minute +1. Highest score wins; ties
//!    keep the first-encountered candidate.
//! 3. No candidate scores above zero → unresolved (`"NA"`).

use crate::models::{Batch, ComponentTest, Test};

/// Result of resolving a test back to its formulation component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiOrigin {
    /// Component (API) id, when resolvable.
    pub id: Option<String>,
    /// Component display label, `"NA"` when unresolved.
    pub label: String,
}

impl ApiOrigin {
    fn unresolved() -> Self {
        Self {
            id: None,
            label: "NA".to_string(),
        }
    }
}

/// Normalizes mobile-phase codes for comparison: uppercase, trim,
/// dedupe, sort. Order-, case-, and duplicate-insensitive.
pub fn normalize_mobile_phases(codes: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = codes
        .iter()
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

/// Joined normalized form, usable as a comparison/bucket key.
pub fn mobile_phase_key(codes: &[String]) -> String {
    normalize_mobile_phases(codes).join("|")
}

/// Resolves the formulation component a flattened test originated from.
pub fn resolve_origin_api(batch: &Batch, test: &Test, position_hint: Option<usize>) -> ApiOrigin {
    let candidates: Vec<(&str, &str, &ComponentTest)> = batch
        .components
        .iter()
        .flat_map(|c| c.tests.iter().map(move |t| (c.id.as_str(), c.name.as_str(), t)))
        .collect();
    if candidates.is_empty() {
        return ApiOrigin::unresolved();
    }

    // Hint path: duplicate tests from multiple components are
    // disambiguated by position among the structural matches.
    let matching: Vec<(&str, &str)> = candidates
        .iter()
        .filter(|(_, _, ct)| is_structural_match(test, ct))
        .map(|&(id, name, _)| (id, name))
        .collect();
    if matching.len() > 1 {
        if let Some(hint) = position_hint {
            if let Some(&(id, name)) = matching.get(hint) {
                return origin_of(id, name);
            }
            // Hint past the end: fall through to scoring.
        }
    }

    // Scoring path.
    let test_phases = normalize_mobile_phases(&test.mobile_phases);
    let mut best: Option<(i32, &str, &str)> = None;
    for &(id, name, ct) in &candidates {
        let mut score = 0;
        if is_structural_match(test, ct) {
            score += 10;
        }
        if normalize_mobile_phases(&ct.mobile_phases) == test_phases {
            score += 5;
        }
        if shares_pharmacopoeia(test, ct) {
            score += 1;
        }
        if (ct.runtime_minutes - test.shared_runtime_minutes).abs() <= 1.0 {
            score += 1;
        }
        // Strict comparison keeps the first-encountered candidate on ties.
        if score > best.map_or(0, |(s, _, _)| s) {
            best = Some((score, id, name));
        }
    }

    match best {
        Some((_, id, name)) => origin_of(id, name),
        None => ApiOrigin::unresolved(),
    }
}

fn origin_of(id: &str, name: &str) -> ApiOrigin {
    ApiOrigin {
        id: Some(id.to_string()),
        label: if name.is_empty() {
            id.to_string()
        } else {
            name.to_string()
        },
    }
}

fn is_structural_match(test: &Test, ct: &ComponentTest) -> bool {
    test.name.trim().eq_ignore_ascii_case(ct.name.trim())
        && test.column_code.trim() == ct.column_code.trim()
        && test.detector_id.trim() == ct.detector_id.trim()
        && normalize_mobile_phases(&test.mobile_phases) == normalize_mobile_phases(&ct.mobile_phases)
        && (test.shared_runtime_minutes - ct.runtime_minutes).abs() < 1e-9
        && test.counts.sample == ct.sample_injections
        && test.counts.standard == ct.standard_injections
}

fn shares_pharmacopoeia(test: &Test, ct: &ComponentTest) -> bool {
    match (&test.pharmacopoeia, &ct.pharmacopoeia) {
        (Some(a), Some(b)) => {
            !a.trim().is_empty() && a.trim().eq_ignore_ascii_case(b.trim())
        }
        _ => false,
    }
}
