use clap::Parser;
use url::Url;

use std::path::PathBuf;
use std::time::Duration;

use snat_agent_lib::config::{self, ClusterIpRange};
use snat_agent_lib::rule_store::{self, IptablesRuleStore};
use snat_agent_lib::version::{self, VersionPolicy};
use snat_agent_lib::{logging, metadata};

pub const ENV_VAR_ONCE: &str = "SNAT_AGENT_ONCE";

/// SNAT agent - keeps the cluster scoped masquerade rule ahead of kubenet's broad one
#[derive(Clone, Debug, Parser)]
#[command(version)]
pub struct Cli {
    /// Cluster IP range CIDR, skips the metadata lookup when given
    #[arg(long, env = config::ENV_VAR_CLUSTER_IP_RANGE)]
    pub cluster_ip_range: Option<ClusterIpRange>,

    /// Metadata endpoint serving the kube-env attribute
    #[arg(long, env = metadata::ENV_VAR_URL, default_value = metadata::DEFAULT_URL)]
    pub metadata_url: Url,

    /// Timeout for a single metadata request
    #[arg(long, env = metadata::ENV_VAR_TIMEOUT, default_value = "5s", value_parser = humantime::parse_duration)]
    pub metadata_timeout: Duration,

    /// Seconds between two checks of the NAT table
    #[arg(long, env = config::ENV_VAR_CHECK_INTERVAL)]
    pub check_interval: Option<String>,

    /// Binary queried for its version at startup
    #[arg(long, env = version::ENV_VAR_COMMAND, default_value = version::DEFAULT_COMMAND)]
    pub iptables_command: String,

    /// Requested iptables version
    #[arg(long, env = version::ENV_VAR_VERSION)]
    pub iptables_version: Option<String>,

    /// Accepted iptables major version, `*` accepts any
    #[arg(long, env = version::ENV_VAR_MAJOR)]
    pub iptables_major: Option<String>,

    /// Accepted iptables minor version, `*` accepts any
    #[arg(long, env = version::ENV_VAR_MINOR)]
    pub iptables_minor: Option<String>,

    /// Accepted iptables patch version, `*` accepts any
    #[arg(long, env = version::ENV_VAR_PATCH)]
    pub iptables_patch: Option<String>,

    /// Command dumping the rule set
    #[arg(long, env = "IPTABLES_SAVE_COMMAND", default_value = rule_store::DEFAULT_SAVE_COMMAND)]
    pub save_command: String,

    /// Command loading a rule set from stdin
    #[arg(long, env = "IPTABLES_RESTORE_COMMAND", default_value = rule_store::DEFAULT_RESTORE_COMMAND)]
    pub restore_command: String,

    /// Log to this file instead of stdout
    #[arg(long, env = logging::ENV_VAR_LOG_FILE)]
    pub log_file: Option<PathBuf>,

    /// Run a single check cycle and exit
    #[arg(long, env = ENV_VAR_ONCE)]
    pub once: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

impl Cli {
    pub fn interval(&self) -> Duration {
        config::interval_from_setting(self.check_interval.as_deref())
    }

    pub fn version_policy(&self) -> VersionPolicy {
        VersionPolicy::new(
            self.iptables_version.clone(),
            self.iptables_major.clone(),
            self.iptables_minor.clone(),
            self.iptables_patch.clone(),
        )
    }

    pub fn rule_store(&self) -> IptablesRuleStore {
        IptablesRuleStore::new(self.save_command.clone(), self.restore_command.clone())
    }
}
