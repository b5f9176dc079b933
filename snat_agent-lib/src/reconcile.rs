//! One poll cycle: fetch, validate, repair, re-verify, commit.
//!
//! Infrastructure failures surface as [`Error`]. Rule layout problems are
//! reported through [`Outcome`] so the two can be told apart in logs.

use thiserror::Error;

use crate::config::ClusterIpRange;
use crate::repair;
use crate::rule_store::{self, RuleStore};
use crate::validator::{self, Positions, Shape, Verdict};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to fetch rule dump: {0}")]
    Fetch(#[source] rule_store::Error),
    #[error("Unable to load repaired rule dump: {0}")]
    Restore(#[source] rule_store::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Rules already in the required shape; nothing was written.
    Compliant(Positions),
    /// A verified repair was loaded.
    Repaired { shape: Shape, positions: Positions },
    /// The layout matches no repair strategy; nothing was written.
    RepairInapplicable(Verdict),
    /// A repair was attempted but its result failed validation; nothing was written.
    RepairUnverified(Verdict),
}

impl Outcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Outcome::Compliant(_) | Outcome::Repaired { .. })
    }
}

pub async fn reconcile<S>(store: &S, cluster_range: &ClusterIpRange) -> Result<Outcome, Error>
where
    S: RuleStore + ?Sized,
{
    let dump = store.save().await.map_err(Error::Fetch)?;
    tracing::debug!(lines = dump.len(), generator = ?dump.generator_version(), "fetched rule dump");

    let verdict = validator::validate(&dump, cluster_range);
    tracing::info!(
        broad = %verdict.positions.broad,
        scoped = %verdict.positions.scoped,
        "masquerade rule positions"
    );
    if verdict.satisfied {
        tracing::info!("nat table check: ok");
        return Ok(Outcome::Compliant(verdict.positions));
    }

    let shape = verdict.shape();
    tracing::warn!(%shape, "nat table does not satisfy masquerade rule ordering");

    let repair = repair::repair(&dump, cluster_range, &verdict);
    if !repair.is_valid() {
        if shape == Shape::Unrepairable {
            tracing::error!(%cluster_range, "no repair applies to this nat table layout");
            return Ok(Outcome::RepairInapplicable(verdict));
        }
        tracing::error!(
            broad = %repair.verdict.positions.broad,
            scoped = %repair.verdict.positions.scoped,
            "repaired rule dump failed validation - discarding"
        );
        return Ok(Outcome::RepairUnverified(repair.verdict));
    }

    tracing::info!("nat table restore buffer created successfully");
    store.restore(&repair.dump).await.map_err(Error::Restore)?;
    tracing::info!("iptables-restore successful");
    Ok(Outcome::Repaired {
        shape,
        positions: repair.verdict.positions,
    })
}
