//! Decides whether a dump has the scoped masquerade rule ahead of the broad one.
//!
//! Validation never fails: an unsatisfied [`Verdict`] is ordinary data telling
//! the caller which repair, if any, applies.

use std::fmt::{self, Display};

use crate::config::ClusterIpRange;
use crate::dump::RuleDump;
use crate::matcher::{self, Position};
use crate::rules;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Positions {
    pub broad: Position,
    pub scoped: Position,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub positions: Positions,
    pub satisfied: bool,
}

/// Classification of a verdict by the repair it calls for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Satisfied,
    /// Broad rule present, scoped rule absent.
    MissingScoped { broad: usize },
    /// Both present, broad rule evaluated first.
    Misordered { broad: usize, scoped: usize },
    /// Anything else: both absent, scoped without broad, or a suffix mismatch.
    Unrepairable,
}

impl Verdict {
    pub fn shape(&self) -> Shape {
        if self.satisfied {
            return Shape::Satisfied;
        }
        match (self.positions.broad, self.positions.scoped) {
            (Position::Found(broad), Position::NotFound) => Shape::MissingScoped { broad },
            (Position::Found(broad), Position::Found(scoped)) if broad < scoped => Shape::Misordered { broad, scoped },
            _ => Shape::Unrepairable,
        }
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Satisfied => write!(f, "satisfied"),
            Shape::MissingScoped { broad } => write!(f, "scoped rule missing ahead of broad rule at line {broad}"),
            Shape::Misordered { broad, scoped } => {
                write!(f, "broad rule at line {broad} precedes scoped rule at line {scoped}")
            }
            Shape::Unrepairable => write!(f, "unrepairable rule layout"),
        }
    }
}

pub fn validate(dump: &RuleDump, cluster_range: &ClusterIpRange) -> Verdict {
    let lines = dump.lines();
    let scoped_pattern = rules::scoped_rule_pattern(cluster_range);
    let positions = Positions {
        broad: matcher::find_fragment(rules::BROAD_RULE, lines),
        scoped: matcher::find_fragment(&scoped_pattern, lines),
    };

    let satisfied = match (positions.broad, positions.scoped) {
        (Position::Found(broad), Position::Found(scoped)) if scoped < broad => {
            let broad_ok = has_required_suffix(dump, broad);
            if !broad_ok {
                tracing::debug!(line = broad, "broad masquerade rule suffix is incorrect");
            }
            let scoped_ok = has_required_suffix(dump, scoped);
            if !scoped_ok {
                tracing::debug!(line = scoped, "scoped masquerade rule suffix is incorrect");
            }
            broad_ok && scoped_ok
        }
        _ => false,
    };

    Verdict { positions, satisfied }
}

fn has_required_suffix(dump: &RuleDump, index: usize) -> bool {
    dump.line(index)
        .is_some_and(|line| line.ends_with(rules::NAT_POSTROUTING_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROAD: &str = "-A POSTROUTING ! -d 10.0.0.0/8 -m addrtype ! --dst-type LOCAL -j MASQUERADE";
    const SCOPED: &str = "-A POSTROUTING ! -d 10.244.0.0/16 -m addrtype ! --dst-type LOCAL -j MASQUERADE";

    fn dump_with(rules: &[(usize, &str)]) -> RuleDump {
        let mut lines: Vec<String> = (0..10).map(|i| format!("-A OTHER -j RETURN #{i}")).collect();
        lines[0] = "# Generated by iptables-save v1.6.0".to_string();
        for (index, rule) in rules {
            lines[*index] = rule.to_string();
        }
        RuleDump::from(lines)
    }

    fn range() -> ClusterIpRange {
        "10.244.0.0/16".parse().expect("valid range")
    }

    #[test]
    fn scoped_before_broad_is_satisfied() -> anyhow::Result<()> {
        let verdict = validate(&dump_with(&[(3, SCOPED), (7, BROAD)]), &range());

        assert!(verdict.satisfied);
        assert_eq!(verdict.positions.scoped, Position::Found(3));
        assert_eq!(verdict.positions.broad, Position::Found(7));
        assert_eq!(verdict.shape(), Shape::Satisfied);
        Ok(())
    }

    #[test]
    fn broad_before_scoped_is_misordered() -> anyhow::Result<()> {
        let verdict = validate(&dump_with(&[(3, BROAD), (7, SCOPED)]), &range());

        assert!(!verdict.satisfied);
        assert_eq!(verdict.shape(), Shape::Misordered { broad: 3, scoped: 7 });
        Ok(())
    }

    #[test]
    fn missing_scoped_rule_keeps_broad_position() -> anyhow::Result<()> {
        let verdict = validate(&dump_with(&[(5, BROAD)]), &range());

        assert!(!verdict.satisfied);
        assert_eq!(verdict.positions.broad, Position::Found(5));
        assert_eq!(verdict.positions.scoped, Position::NotFound);
        assert_eq!(verdict.shape(), Shape::MissingScoped { broad: 5 });
        Ok(())
    }

    #[test]
    fn no_rules_is_unrepairable() -> anyhow::Result<()> {
        let verdict = validate(&dump_with(&[]), &range());

        assert!(!verdict.satisfied);
        assert_eq!(verdict.positions.broad, Position::NotFound);
        assert_eq!(verdict.positions.scoped, Position::NotFound);
        assert_eq!(verdict.shape(), Shape::Unrepairable);
        Ok(())
    }

    #[test]
    fn scoped_without_broad_is_unrepairable() -> anyhow::Result<()> {
        let verdict = validate(&dump_with(&[(4, SCOPED)]), &range());
        assert_eq!(verdict.shape(), Shape::Unrepairable);
        Ok(())
    }

    #[test]
    fn decoy_scoped_line_fails_suffix_check() -> anyhow::Result<()> {
        let decoy = "-A POSTROUTING ! -d 10.244.0.0/16 -j RETURN";
        let verdict = validate(&dump_with(&[(2, decoy), (6, BROAD)]), &range());

        assert_eq!(verdict.positions.scoped, Position::Found(2));
        assert_eq!(verdict.positions.broad, Position::Found(6));
        assert!(!verdict.satisfied);
        assert_eq!(verdict.shape(), Shape::Unrepairable);
        Ok(())
    }

    #[test]
    fn decoy_broad_line_fails_suffix_check() -> anyhow::Result<()> {
        let decoy = "-A POSTROUTING ! -d 10.0.0.0/8 -o eth0 -j SNAT --to-source 10.1.2.3";
        let verdict = validate(&dump_with(&[(2, SCOPED), (6, decoy)]), &range());
        assert!(!verdict.satisfied);
        Ok(())
    }

    #[test]
    fn counters_and_comments_do_not_affect_match() -> anyhow::Result<()> {
        let scoped = "[0:0] -A POSTROUTING ! -d 10.244.0.0/16 -m comment --comment \"ClusterIP: SNAT for outbound traffic\" -m addrtype ! --dst-type LOCAL -j MASQUERADE";
        let broad = "[5:300] -A POSTROUTING ! -d 10.0.0.0/8 -m comment --comment \"kubenet: SNAT for outbound traffic from cluster\" -m addrtype ! --dst-type LOCAL -j MASQUERADE";
        let verdict = validate(&dump_with(&[(4, scoped), (5, broad)]), &range());
        assert!(verdict.satisfied);
        Ok(())
    }

    #[test]
    fn rule_on_first_line_is_a_real_match() -> anyhow::Result<()> {
        // headerless dump: line 0 counts like any other line
        let verdict = validate(&RuleDump::from(vec![SCOPED.to_string(), BROAD.to_string()]), &range());

        assert!(verdict.satisfied);
        assert_eq!(verdict.positions.scoped, Position::Found(0));
        assert_eq!(verdict.positions.broad, Position::Found(1));

        let verdict = validate(&RuleDump::from(vec![BROAD.to_string(), SCOPED.to_string()]), &range());
        assert_eq!(verdict.shape(), Shape::Misordered { broad: 0, scoped: 1 });
        Ok(())
    }
}
