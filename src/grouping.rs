//! Compatibility grouping of co-scheduled tests.
//!
//! Given one instrument's ordered test list, partitions it into
//! optimization groups that share setup — linked test pairs first, then
//! buckets keyed by `(column, mobile phases + wash time, detector, test
//! type)` — and re-prices every group member by its position so only the
//! first and last members pay full injection cost.
//!
//! # Determinism
//!
//! Given the same input order, the output is fully reproducible: buckets
//! form in first-occurrence order and both partitions (grouped, ungrouped)
//! preserve relative input order. No unordered-map iteration reaches the
//! output.

use std::collections::HashMap;

use tracing::warn;

use crate::cost::CostModel;
use crate::models::{Group, ScheduledTest};
use crate::resolver::mobile_phase_key;

/// Result of one grouping pass.
#[derive(Debug, Clone)]
pub struct GroupingOutcome {
    /// Reordered tests: group members (contiguous, formation order), then
    /// ungrouped tests in input order.
    pub tests: Vec<ScheduledTest>,
    /// Groups in formation order: linked groups first, then buckets.
    pub groups: Vec<Group>,
}

impl GroupingOutcome {
    /// Sum of current execution times (minutes).
    pub fn total_minutes(&self) -> f64 {
        self.tests.iter().map(|t| t.execution_time).sum()
    }
}

/// The grouping engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupingEngine {
    cost_model: CostModel,
}

impl GroupingEngine {
    /// Creates an engine over a cost model.
    pub fn new(cost_model: CostModel) -> Self {
        Self { cost_model }
    }

    /// Groups one queue's tests.
    pub fn group_queue(&self, tests: Vec<ScheduledTest>) -> GroupingOutcome {
        self.group_with_existing(Vec::new(), tests)
    }

    /// Groups incoming tests merged after an already-sequenced list.
    pub fn group_with_existing(
        &self,
        existing: Vec<ScheduledTest>,
        incoming: Vec<ScheduledTest>,
    ) -> GroupingOutcome {
        let mut combined = existing;
        combined.extend(incoming);

        for test in &mut combined {
            test.reset_grouping();
        }

        if combined.len() <= 1 {
            return GroupingOutcome {
                tests: combined,
                groups: Vec::new(),
            };
        }

        // Linked pass: all linked tests of one batch merge into one group,
        // regardless of other similarity.
        let mut linked_member_sets: Vec<Vec<usize>> = Vec::new();
        let mut linked_batch_pos: HashMap<&str, usize> = HashMap::new();
        for (idx, test) in combined.iter().enumerate() {
            if !test.test.linked {
                continue;
            }
            match linked_batch_pos.get(test.test.batch_id.as_str()) {
                Some(&pos) => linked_member_sets[pos].push(idx),
                None => {
                    linked_batch_pos.insert(test.test.batch_id.as_str(), linked_member_sets.len());
                    linked_member_sets.push(vec![idx]);
                }
            }
        }
        linked_member_sets.retain(|members| members.len() >= 2);

        let mut in_linked_group = vec![false; combined.len()];
        for members in &linked_member_sets {
            for &idx in members {
                in_linked_group[idx] = true;
            }
        }

        // Bucket pass over the remainder, keyed by shared setup.
        let keys: Vec<String> = combined.iter().map(|t| bucket_key(t)).collect();
        let mut bucket_member_sets: Vec<Vec<usize>> = Vec::new();
        let mut bucket_pos: HashMap<&str, usize> = HashMap::new();
        for (idx, key) in keys.iter().enumerate() {
            if in_linked_group[idx] {
                continue;
            }
            match bucket_pos.get(key.as_str()) {
                Some(&pos) => bucket_member_sets[pos].push(idx),
                None => {
                    bucket_pos.insert(key.as_str(), bucket_member_sets.len());
                    bucket_member_sets.push(vec![idx]);
                }
            }
        }
        bucket_member_sets.retain(|members| members.len() >= 2);

        // Overlapping membership is an error condition to surface, not
        // silently resolve: a linked member whose setup key also buckets
        // with other tests stays in its linked group.
        for members in &linked_member_sets {
            for &idx in members {
                let shared = keys
                    .iter()
                    .enumerate()
                    .filter(|(other, key)| *other != idx && *key == &keys[idx])
                    .count();
                if shared > 0 {
                    warn!(
                        schedule_id = combined[idx].schedule_id,
                        test_id = %combined[idx].test.id,
                        "linked test also matches a compatibility bucket; linked grouping kept"
                    );
                }
            }
        }

        // Materialize groups: linked first, then buckets, members in
        // input order. Positional masks re-price every member.
        let mut groups = Vec::new();
        let mut grouped_tests: Vec<ScheduledTest> = Vec::new();
        let mut consumed = vec![false; combined.len()];
        let mut next_group_id: u32 = 1;

        for (is_linked, member_sets) in [(true, &linked_member_sets), (false, &bucket_member_sets)]
        {
            for members in member_sets.iter() {
                let group_id = next_group_id;
                next_group_id += 1;

                let member_tests: Vec<&crate::models::Test> =
                    members.iter().map(|&idx| &combined[idx].test).collect();
                let costed = self.cost_model.grouped_cost(&member_tests);
                let reason = if is_linked {
                    "linked tests group".to_string()
                } else {
                    let pct = if costed.ungrouped_minutes > 0.0 {
                        costed.time_saved / costed.ungrouped_minutes * 100.0
                    } else {
                        0.0
                    };
                    format!(
                        "same column/detector/mobile phase: saved {:.1} min ({:.1}%)",
                        costed.time_saved, pct
                    )
                };

                let first = &combined[members[0]];
                groups.push(Group {
                    id: group_id,
                    column_code: first.test.column_code.clone(),
                    detector_id: first.test.detector_id.clone(),
                    phase_key: mobile_phase_key(&first.test.mobile_phases),
                    member_ids: members.iter().map(|&idx| combined[idx].schedule_id).collect(),
                    total_minutes: costed.grouped_minutes,
                    ungrouped_minutes: costed.ungrouped_minutes,
                    time_saved: costed.time_saved,
                    reason: reason.clone(),
                });

                for (pos, &idx) in members.iter().enumerate() {
                    let mut test = combined[idx].clone();
                    test.assign_group(group_id, &reason, costed.member_minutes[pos]);
                    grouped_tests.push(test);
                    consumed[idx] = true;
                }
            }
        }

        let mut tests = grouped_tests;
        for (idx, test) in combined.into_iter().enumerate() {
            if !consumed[idx] {
                tests.push(test);
            }
        }

        GroupingOutcome { tests, groups }
    }
}

/// Setup key for the bucket pass: column, normalized phases plus wash
/// time, detector, and test type.
fn bucket_key(test: &ScheduledTest) -> String {
    format!(
        "{}|{}|W{}|{}|{}",
        test.test.column_code.trim(),
        mobile_phase_key(&test.test.mobile_phases),
        test.test.wash_minutes,
        test.test.detector_id.trim(),
        test.test.test_type_id.trim()
    )
}
