//! Report differencing.
//!
//! Compares two reports of the same application and classifies the older
//! report's policy components as fixed or waived in the newer one.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::client::{Cancel, IqClient};
use crate::error::Result;
use crate::models::{PolicyReportComponent, Report, ReportDiff};

/// Orders two reports as `(earlier, later)` by raw-side evaluation timestamp.
///
/// A missing or unparseable timestamp sorts before any parsed one, so a
/// report that is no longer listed counts as the earlier one. `first` is kept
/// first only when `second` is strictly later; ties put `second` first.
pub fn order_chronologically(first: Report, second: Report) -> (Report, Report) {
    let first_date = first.raw.report_info.parsed_evaluation_date();
    let second_date = second.raw.report_info.parsed_evaluation_date();

    // None < Some
    if second_date > first_date {
        (first, second)
    } else {
        (second, first)
    }
}

/// Classifies the policy components of `older` against `newer`.
///
/// A component is fixed when its hash is gone from `newer`, or when one of
/// its violated policies no longer applies to the matching component. A
/// matching component is waived when a violation of a shared policy is
/// waived in `newer`. Each component appears at most once per set.
pub fn compare(older: Report, newer: Report) -> ReportDiff {
    let (fixed, waived) = {
        let newer_by_hash: HashMap<&str, &PolicyReportComponent> = newer
            .policy
            .components
            .iter()
            .map(|c| (c.hash(), c))
            .collect();

        let mut fixed = Classified::default();
        let mut waived = Classified::default();

        for old in &older.policy.components {
            let Some(new) = newer_by_hash.get(old.hash()) else {
                fixed.push(old);
                continue;
            };

            for old_violation in &old.violations {
                let mut found = false;
                for new_violation in new
                    .violations
                    .iter()
                    .filter(|v| v.policy_id == old_violation.policy_id)
                {
                    found = true;
                    if new_violation.waived {
                        waived.push(new);
                    }
                }
                if !found {
                    fixed.push(old);
                }
            }
        }

        (fixed.components, waived.components)
    };

    debug!(
        "Compared {} older components: {} fixed, {} waived",
        older.policy.components.len(),
        fixed.len(),
        waived.len()
    );

    ReportDiff {
        reports: [older, newer],
        waived,
        fixed,
    }
}

/// Components in classification order, unique by hash.
#[derive(Default)]
struct Classified {
    seen: HashSet<String>,
    components: Vec<PolicyReportComponent>,
}

impl Classified {
    fn push(&mut self, component: &PolicyReportComponent) {
        if self.seen.insert(component.hash().to_string()) {
            self.components.push(component.clone());
        }
    }
}

impl IqClient {
    /// Differences between two reports of one application.
    ///
    /// The second report is only fetched once the first succeeded; the first
    /// failure is returned as-is.
    pub async fn diff_reports(
        &self,
        cancel: &Cancel,
        app_public_id: &str,
        report_id1: &str,
        report_id2: &str,
    ) -> Result<ReportDiff> {
        let report1 = self
            .fetch_report_by_report_id(cancel, app_public_id, report_id1)
            .await?;
        let report2 = self
            .fetch_report_by_report_id(cancel, app_public_id, report_id2)
            .await?;

        let (older, newer) = order_chronologically(report1, report2);
        info!(
            "Diffing '{}' reports {} -> {}",
            app_public_id,
            older.raw.report_info.report_id(),
            newer.raw.report_info.report_id()
        );
        Ok(compare(older, newer))
    }
}
