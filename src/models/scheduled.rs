//! Scheduled-test and group models.
//!
//! A `ScheduledTest` wraps an input [`Test`](super::Test) for the lifetime
//! of one scheduling run. It is created once per flattened test, mutated in
//! place by the grouping engine and the manual-move protocol, and discarded
//! wholesale on the next full run — never persisted.

use serde::{Deserialize, Serialize};

use super::Test;

/// A test instance inside one scheduling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTest {
    /// Schedule-id, unique within the run.
    pub schedule_id: u64,
    /// The source test record.
    pub test: Test,
    /// Denormalized batch number for display.
    #[serde(default)]
    pub batch_number: String,
    /// Denormalized product name for display.
    #[serde(default)]
    pub product_name: String,
    /// Originating formulation component id, when resolvable.
    #[serde(default)]
    pub api_id: Option<String>,
    /// Originating component label ("NA" when unresolved).
    #[serde(default)]
    pub api_label: String,
    /// Resolved detector display name.
    #[serde(default)]
    pub detector_name: String,
    /// Current cost (minutes); reduced when grouped.
    pub execution_time: f64,
    /// Cost with every injection category active — the un-grouped baseline.
    pub original_execution_time: f64,
    /// Group membership, when grouped.
    #[serde(default)]
    pub group_id: Option<u32>,
    /// Human-readable grouping reason.
    #[serde(default)]
    pub group_reason: Option<String>,
    #[serde(default)]
    pub is_grouped: bool,
    /// Minutes saved against the un-grouped baseline.
    #[serde(default)]
    pub time_saved: f64,
    /// Manual ordering index, set when a user places this test by hand.
    #[serde(default)]
    pub sort_order: Option<usize>,
}

impl ScheduledTest {
    /// Wraps a test with its full-active baseline cost.
    pub fn new(schedule_id: u64, test: Test, baseline_minutes: f64) -> Self {
        Self {
            schedule_id,
            test,
            batch_number: String::new(),
            product_name: String::new(),
            api_id: None,
            api_label: "NA".to_string(),
            detector_name: String::new(),
            execution_time: baseline_minutes,
            original_execution_time: baseline_minutes,
            group_id: None,
            group_reason: None,
            is_grouped: false,
            time_saved: 0.0,
            sort_order: None,
        }
    }

    /// Clears group membership and restores the baseline cost.
    pub fn reset_grouping(&mut self) {
        self.execution_time = self.original_execution_time;
        self.group_id = None;
        self.group_reason = None;
        self.is_grouped = false;
        self.time_saved = 0.0;
    }

    /// Records membership in a group with a recomputed cost.
    pub fn assign_group(&mut self, group_id: u32, reason: &str, masked_minutes: f64) {
        self.execution_time = masked_minutes;
        self.time_saved = self.original_execution_time - masked_minutes;
        self.group_id = Some(group_id);
        self.group_reason = Some(reason.to_string());
        self.is_grouped = true;
    }
}

/// A set of tests sharing setup, scheduled back-to-back.
///
/// Membership is fully determined by the grouping engine's key function
/// plus the linked-tests override; it is never edited by hand. Members are
/// contiguous in their queue, with a defined first and last position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Group identifier, unique within one queue/sequence.
    pub id: u32,
    /// Shared column code.
    pub column_code: String,
    /// Shared detector id.
    pub detector_id: String,
    /// Normalized shared mobile-phase key.
    pub phase_key: String,
    /// Member schedule-ids, in run order.
    pub member_ids: Vec<u64>,
    /// Total optimized time (minutes).
    pub total_minutes: f64,
    /// Total time had the members run un-grouped (minutes).
    pub ungrouped_minutes: f64,
    /// `ungrouped_minutes - total_minutes`.
    pub time_saved: f64,
    /// Human-readable reason ("linked tests group" or savings summary).
    pub reason: String,
}

impl Group {
    /// Number of members.
    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    /// Whether the group has no members.
    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }
}
