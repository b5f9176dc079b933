use cidr::IpCidr;
use thiserror::Error;

use std::fmt::{self, Display};
use std::str::FromStr;
use std::time::Duration;

use crate::rules;

pub const ENV_VAR_CLUSTER_IP_RANGE: &str = "CLUSTER_IP_RANGE";
pub const ENV_VAR_CHECK_INTERVAL: &str = "IPTABLES_CHECK_INTERVAL";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cluster IP range is empty")]
    EmptyClusterRange,
    #[error("Invalid cluster IP range {value:?}: {reason}")]
    InvalidClusterRange { value: String, reason: String },
    #[error("Cluster IP range {0} is the range excluded by the broad masquerade rule")]
    ShadowsBroadRule(ClusterIpRange),
}

/// CIDR of the cluster's private address space.
///
/// Renders in the form `iptables-save` prints destinations: network address
/// and prefix length, including `/32` for single hosts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterIpRange(IpCidr);

impl FromStr for ClusterIpRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.is_empty() {
            return Err(Error::EmptyClusterRange);
        }
        let cidr = value.parse::<IpCidr>().map_err(|e| Error::InvalidClusterRange {
            value: value.to_string(),
            reason: e.to_string(),
        })?;
        let range = ClusterIpRange(cidr);
        if range.to_string() == rules::BROAD_EXCLUDED_RANGE {
            return Err(Error::ShadowsBroadRule(range));
        }
        Ok(range)
    }
}

impl Display for ClusterIpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.first_address(), self.0.network_length())
    }
}

/// Settings resolved once at startup and passed explicitly to every cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub cluster_range: ClusterIpRange,
    pub interval: Duration,
}

impl Config {
    pub fn new(cluster_range: ClusterIpRange, interval: Duration) -> Self {
        Config { cluster_range, interval }
    }
}

/// Interprets the check interval setting as whole seconds.
///
/// Missing, unparsable or zero values fall back to [`DEFAULT_INTERVAL`].
pub fn interval_from_setting(setting: Option<&str>) -> Duration {
    match setting.map(str::trim).map(str::parse::<u64>) {
        Some(Ok(secs)) if secs > 0 => Duration::from_secs(secs),
        Some(Ok(_)) => {
            tracing::warn!("zero check interval - using default");
            DEFAULT_INTERVAL
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "unparsable check interval - using default");
            DEFAULT_INTERVAL
        }
        None => DEFAULT_INTERVAL,
    }
}
