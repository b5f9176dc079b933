//! Produces a corrected dump from an unsatisfied verdict.
//!
//! The broad rule is never removed: kubenet re-adds it on every sync, so the
//! fix has to work around it. Every candidate is validated again before it is
//! reported as fixed.

use crate::config::ClusterIpRange;
use crate::dump::RuleDump;
use crate::rules;
use crate::validator::{self, Shape, Verdict};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Repair {
    pub dump: RuleDump,
    /// Verdict of the candidate dump, not of the input.
    pub verdict: Verdict,
}

impl Repair {
    pub fn is_valid(&self) -> bool {
        self.verdict.satisfied
    }
}

pub fn repair(dump: &RuleDump, cluster_range: &ClusterIpRange, verdict: &Verdict) -> Repair {
    let candidate = match verdict.shape() {
        Shape::MissingScoped { broad } => {
            tracing::debug!(line = broad, "inserting scoped masquerade rule");
            dump.with_line_inserted(broad, rules::scoped_rule(cluster_range))
        }
        Shape::Misordered { broad, scoped } => {
            tracing::debug!(broad, scoped, "swapping masquerade rules");
            dump.with_lines_swapped(broad, scoped)
        }
        Shape::Satisfied | Shape::Unrepairable => dump.clone(),
    };

    let verdict = validator::validate(&candidate, cluster_range);
    Repair {
        dump: candidate,
        verdict,
    }
}
