//! Fixed fragments of the NAT POSTROUTING masquerade rules.
//!
//! The broad rule is owned by kubenet and re-added on each of its syncs. The
//! scoped rule belongs to this agent and must precede the broad one.

use crate::config::ClusterIpRange;

pub const NAT_POSTROUTING_PREFIX: &str = "-A POSTROUTING";
pub const NAT_POSTROUTING_SUFFIX: &str = "-m addrtype ! --dst-type LOCAL -j MASQUERADE";

/// Private range excluded by the broad rule.
pub const BROAD_EXCLUDED_RANGE: &str = "10.0.0.0/8";
pub const BROAD_RULE: &str = "-A POSTROUTING ! -d 10.0.0.0/8";

/// Annotation carried by synthesized scoped rules. Not used for matching.
pub const CLUSTER_SNAT_COMMENT: &str = " -m comment --comment \"ClusterIP: SNAT for outbound traffic\" ";

/// Fragment identifying the scoped rule for `range`.
pub fn scoped_rule_pattern(range: &ClusterIpRange) -> String {
    format!("{NAT_POSTROUTING_PREFIX} ! -d {range}")
}

/// Full text of a scoped rule as it is inserted into a dump.
pub fn scoped_rule(range: &ClusterIpRange) -> String {
    format!("{}{CLUSTER_SNAT_COMMENT}{NAT_POSTROUTING_SUFFIX}", scoped_rule_pattern(range))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broad_rule_is_prefix_and_range() -> anyhow::Result<()> {
        assert_eq!(BROAD_RULE, format!("{NAT_POSTROUTING_PREFIX} ! -d {BROAD_EXCLUDED_RANGE}"));
        Ok(())
    }

    #[test]
    fn scoped_rule_has_pattern_prefix_and_suffix() -> anyhow::Result<()> {
        let range: ClusterIpRange = "10.244.0.0/16".parse()?;
        let rule = scoped_rule(&range);

        assert_eq!(scoped_rule_pattern(&range), "-A POSTROUTING ! -d 10.244.0.0/16");
        assert_eq!(
            rule,
            "-A POSTROUTING ! -d 10.244.0.0/16 -m comment --comment \"ClusterIP: SNAT for outbound traffic\" -m addrtype ! --dst-type LOCAL -j MASQUERADE"
        );
        assert!(rule.ends_with(NAT_POSTROUTING_SUFFIX));
        Ok(())
    }
}
