//! Access to the live rule set through `iptables-save` and `iptables-restore`.
//!
//! Defines the [`RuleStore`] trait so the reconcile cycle can be exercised
//! without touching the host firewall.
//! Production code uses [`IptablesRuleStore`].
//! Tests use a stateful mock (see `mocks` module).

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::dump::{self, RuleDump};
use crate::shell_command_ext::{self, ShellCommandExt};

pub mod mocks;

pub const DEFAULT_SAVE_COMMAND: &str = "iptables-save";
pub const DEFAULT_RESTORE_COMMAND: &str = "iptables-restore";
const ARG_COUNTERS: &str = "--counters";

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    ShellCommand(#[from] shell_command_ext::Error),
    #[error(transparent)]
    Dump(#[from] dump::Error),
    #[error("{0}")]
    General(String),
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Snapshot of the complete rule set.
    async fn save(&self) -> Result<RuleDump, Error>;

    /// Replaces the rule set with `dump`.
    async fn restore(&self, dump: &RuleDump) -> Result<(), Error>;
}

/// Production [`RuleStore`] running the iptables save/restore tools with
/// packet counters preserved.
#[derive(Clone, Debug)]
pub struct IptablesRuleStore {
    save_command: String,
    restore_command: String,
}

impl IptablesRuleStore {
    pub fn new<S, R>(save_command: S, restore_command: R) -> Self
    where
        S: Into<String>,
        R: Into<String>,
    {
        IptablesRuleStore {
            save_command: save_command.into(),
            restore_command: restore_command.into(),
        }
    }
}

impl Default for IptablesRuleStore {
    fn default() -> Self {
        IptablesRuleStore::new(DEFAULT_SAVE_COMMAND, DEFAULT_RESTORE_COMMAND)
    }
}

#[async_trait]
impl RuleStore for IptablesRuleStore {
    async fn save(&self) -> Result<RuleDump, Error> {
        let stdout = Command::new(&self.save_command).arg(ARG_COUNTERS).run_output().await?;
        let dump = RuleDump::from_bytes(stdout)?;
        Ok(dump)
    }

    async fn restore(&self, dump: &RuleDump) -> Result<(), Error> {
        Command::new(&self.restore_command)
            .arg(ARG_COUNTERS)
            .run_stdin(&dump.to_bytes())
            .await?;
        Ok(())
    }
}
