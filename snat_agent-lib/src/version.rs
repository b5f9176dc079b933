//! Startup gate ensuring the host `iptables` speaks a save/restore format this
//! agent understands.

use thiserror::Error;
use tokio::process::Command;

use crate::shell_command_ext::{self, ShellCommandExt};

pub const VERSION_1_4_14: &str = "1.4.14";
pub const VERSION_1_4_21: &str = "1.4.21";
pub const VERSION_1_6_0: &str = "1.6.0";
pub const DEFAULT_VERSION: &str = VERSION_1_4_21;

pub const ENV_VAR_COMMAND: &str = "IPTABLES_COMMAND";
pub const ENV_VAR_VERSION: &str = "IPTABLES_VERSION";
pub const ENV_VAR_MAJOR: &str = "IPTABLES_MAJOR";
pub const ENV_VAR_MINOR: &str = "IPTABLES_MINOR";
pub const ENV_VAR_PATCH: &str = "IPTABLES_PATCH";

pub const DEFAULT_COMMAND: &str = "iptables";

const WILDCARD: &str = "*";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to query iptables version: {0}")]
    ShellCommand(#[from] shell_command_ext::Error),
    #[error("Unsupported iptables version {actual:?} (requested {requested})")]
    Unsupported { actual: String, requested: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Acceptance {
    /// Output contains the requested version.
    Requested,
    /// Major or minor component was set to `*`.
    Wildcard,
    /// Output contains the version assembled from the components.
    Components(String),
    Rejected,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VersionPolicy {
    requested: String,
    major: Option<String>,
    minor: Option<String>,
    patch: Option<String>,
}

impl VersionPolicy {
    pub fn new(requested: Option<String>, major: Option<String>, minor: Option<String>, patch: Option<String>) -> Self {
        let requested = requested
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());
        VersionPolicy {
            requested,
            major,
            minor,
            patch,
        }
    }

    pub fn requested(&self) -> &str {
        &self.requested
    }

    /// Judges the output of `iptables --version`.
    pub fn accepts(&self, output: &str) -> Acceptance {
        if output.contains(self.requested.as_str()) {
            return Acceptance::Requested;
        }

        let major = self.major.as_deref().unwrap_or_default();
        let minor = self.minor.as_deref().unwrap_or_default();
        let patch = self.patch.as_deref().unwrap_or_default();
        if major == WILDCARD || minor == WILDCARD {
            return Acceptance::Wildcard;
        }

        let mut version = format!("{major}.{minor}.");
        if patch != WILDCARD {
            version.push_str(patch);
        }
        tracing::debug!(%version, major, minor, patch, "checking version components");
        if output.contains(version.as_str()) {
            Acceptance::Components(version)
        } else {
            Acceptance::Rejected
        }
    }
}

/// Runs `<program> --version` and applies `policy` to its output.
pub async fn check(program: &str, policy: &VersionPolicy) -> Result<Acceptance, Error> {
    let output = Command::new(program).arg("--version").run_stdout().await?;
    match policy.accepts(&output) {
        Acceptance::Rejected => Err(Error::Unsupported {
            actual: output,
            requested: policy.requested.clone(),
        }),
        acceptance => {
            tracing::info!(actual = %output, requested = %policy.requested, ?acceptance, "accepting iptables version");
            Ok(acceptance)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    fn policy(requested: Option<&str>, major: Option<&str>, minor: Option<&str>, patch: Option<&str>) -> VersionPolicy {
        VersionPolicy::new(
            requested.map(Into::into),
            major.map(Into::into),
            minor.map(Into::into),
            patch.map(Into::into),
        )
    }

    #[test]
    fn empty_request_uses_default_version() -> anyhow::Result<()> {
        assert_eq!(policy(None, None, None, None).requested(), DEFAULT_VERSION);
        assert_eq!(policy(Some(" "), None, None, None).requested(), DEFAULT_VERSION);
        assert_eq!(policy(Some(VERSION_1_6_0), None, None, None).requested(), VERSION_1_6_0);
        Ok(())
    }

    #[rstest]
    #[case(policy(None, None, None, None), "iptables v1.4.21", Acceptance::Requested)]
    #[case(policy(Some("1.6.0"), None, None, None), "iptables v1.6.0", Acceptance::Requested)]
    #[case(policy(Some("1.6.0"), None, None, None), "iptables v1.4.14", Acceptance::Rejected)]
    #[case(policy(Some("1.6.0"), Some("*"), Some("4"), None), "iptables v1.8.7 (legacy)", Acceptance::Wildcard)]
    #[case(policy(Some("1.6.0"), Some("1"), Some("*"), None), "iptables v1.8.7 (legacy)", Acceptance::Wildcard)]
    #[case(
        policy(Some("1.6.0"), Some("1"), Some("8"), Some("*")),
        "iptables v1.8.7 (legacy)",
        Acceptance::Components("1.8.".to_string())
    )]
    #[case(
        policy(Some("1.6.0"), Some("1"), Some("8"), Some("7")),
        "iptables v1.8.7 (legacy)",
        Acceptance::Components("1.8.7".to_string())
    )]
    #[case(policy(Some("1.6.0"), Some("1"), Some("8"), Some("4")), "iptables v1.8.7 (legacy)", Acceptance::Rejected)]
    #[case(policy(Some("1.6.0"), None, None, None), "iptables v1.8.7 (legacy)", Acceptance::Rejected)]
    fn version_policy_decisions(#[case] version_policy: VersionPolicy, #[case] output: &str, #[case] expected: Acceptance) {
        assert_eq!(version_policy.accepts(output), expected);
    }

    #[tokio::test]
    async fn check_accepts_matching_binary_output() -> anyhow::Result<()> {
        // `echo --version` prints "--version", which carries no version at all
        let res = check("echo", &policy(Some("--version"), None, None, None)).await?;
        assert_eq!(res, Acceptance::Requested);

        let res = check("echo", &policy(None, None, None, None)).await;
        assert!(matches!(res, Err(Error::Unsupported { ref actual, .. }) if actual == "--version"));
        Ok(())
    }

    #[tokio::test]
    async fn check_fails_when_binary_fails() -> anyhow::Result<()> {
        let res = check("false", &policy(None, None, None, None)).await;
        assert!(matches!(
            res,
            Err(Error::ShellCommand(shell_command_ext::Error::CommandFailed(_)))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn check_fails_when_binary_is_missing() -> anyhow::Result<()> {
        let res = check("/nonexistent/iptables", &policy(None, None, None, None)).await;
        assert!(matches!(res, Err(Error::ShellCommand(shell_command_ext::Error::IO(_)))));
        Ok(())
    }
}
