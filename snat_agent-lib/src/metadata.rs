//! Cluster IP range lookup through the GCE instance metadata server.
//!
//! The range is published in the `kube-env` instance attribute as a
//! `CLUSTER_IP_RANGE: <cidr>` line.

use backon::{ExponentialBuilder, Retryable};
use thiserror::Error;
use url::Url;

use std::time::Duration;

use crate::config::{self, ClusterIpRange};

pub const DEFAULT_URL: &str = "http://metadata.google.internal/computeMetadata/v1/instance/attributes/kube-env";
pub const ENV_VAR_URL: &str = "SNAT_AGENT_METADATA_URL";
pub const ENV_VAR_TIMEOUT: &str = "SNAT_AGENT_METADATA_TIMEOUT";
pub const CLUSTER_IP_RANGE_KEY: &str = "CLUSTER_IP_RANGE";

const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";
const METADATA_FLAVOR_VALUE: &str = "Google";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Metadata request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Key {0} not present in metadata response")]
    MissingKey(&'static str),
    #[error(transparent)]
    Config(#[from] config::Error),
}

/// Creates a backoff strategy with exponential backoff and jitter, suitable for retrying the
/// metadata lookup during startup.
pub fn backoff_expo_short_delay() -> ExponentialBuilder {
    ExponentialBuilder::new()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(10))
        .with_factor(2.0)
        .with_max_times(5)
        .with_jitter()
}

pub async fn fetch_kube_env(client: &reqwest::Client, url: &Url) -> Result<String, Error> {
    let resp = client
        .get(url.clone())
        .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE)
        .send()
        .await?
        .error_for_status()?;
    let body = resp.text().await?;
    Ok(body)
}

/// Value of the first line mentioning `key`: its second whitespace separated
/// field, with YAML quoting removed.
pub fn key_value(body: &str, key: &str) -> Option<String> {
    body.lines()
        .find(|line| line.contains(key))
        .and_then(|line| line.split_whitespace().nth(1))
        .map(|value| value.trim_matches(|c| c == '\'' || c == '"').to_string())
}

/// Fetches `kube-env` from `url`, retrying transient failures, and extracts
/// the cluster IP range from it.
pub async fn cluster_ip_range(url: &Url, timeout: Duration) -> Result<ClusterIpRange, Error> {
    lookup(url, timeout, backoff_expo_short_delay()).await
}

async fn lookup(url: &Url, timeout: Duration, backoff: ExponentialBuilder) -> Result<ClusterIpRange, Error> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let body = (|| async { fetch_kube_env(&client, url).await })
        .retry(backoff)
        .notify(|err: &Error, dur: Duration| {
            tracing::warn!(error = %err, "retrying metadata lookup after {:?}", dur);
        })
        .await?;

    let value = key_value(&body, CLUSTER_IP_RANGE_KEY).ok_or(Error::MissingKey(CLUSTER_IP_RANGE_KEY))?;
    let range = value.parse::<ClusterIpRange>()?;
    Ok(range)
}
