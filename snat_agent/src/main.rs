use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use std::process;

use snat_agent_lib::config::{ClusterIpRange, Config};
use snat_agent_lib::reconcile::{self, Outcome};
use snat_agent_lib::rule_store::RuleStore;
use snat_agent_lib::{logging, metadata, version};

mod cli;

// Avoid musl's default allocator due to degraded performance
// https://nickb.dev/blog/default-musl-allocator-considered-harmful-to-performance
#[cfg(target_os = "linux")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

async fn ctrlc_channel() -> Result<mpsc::Receiver<()>, exitcode::ExitCode> {
    let (sender, receiver) = mpsc::channel(32);
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| {
        tracing::error!(error = ?e, "error setting up SIGINT handler");
        exitcode::IOERR
    })?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| {
        tracing::error!(error = ?e, "error setting up SIGTERM handler");
        exitcode::IOERR
    })?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(_) = sigint.recv() => {
                    tracing::debug!("received SIGINT");
                    if sender.send(()).await.is_err() {
                        tracing::warn!("sigint: receiver closed");
                        break;
                    }
                },
                Some(_) = sigterm.recv() => {
                    tracing::debug!("received SIGTERM");
                    if sender.send(()).await.is_err() {
                        tracing::warn!("sigterm: receiver closed");
                        break;
                    }
                },
                else => {
                    tracing::warn!("sigint and sigterm streams closed");
                    break;
                }
            }
        }
    });

    Ok(receiver)
}

async fn cluster_ip_range(args: &cli::Cli) -> Result<ClusterIpRange, exitcode::ExitCode> {
    if let Some(range) = args.cluster_ip_range {
        tracing::info!(%range, "using configured cluster ip range");
        return Ok(range);
    }
    metadata::cluster_ip_range(&args.metadata_url, args.metadata_timeout)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, url = %args.metadata_url, "can't continue without a valid cluster ip range cidr");
            exitcode::CONFIG
        })
}

async fn startup(args: &cli::Cli) -> Result<Config, exitcode::ExitCode> {
    version::check(&args.iptables_command, &args.version_policy()).await.map_err(|err| {
        tracing::error!(error = %err, "can't continue without a supported version of iptables");
        exitcode::UNAVAILABLE
    })?;

    let cluster_range = cluster_ip_range(args).await?;
    let config = Config::new(cluster_range, args.interval());
    tracing::info!(
        cluster_range = %config.cluster_range,
        interval = %humantime::format_duration(config.interval),
        "working configuration"
    );
    Ok(config)
}

async fn daemon(args: cli::Cli) -> Result<(), exitcode::ExitCode> {
    let config = startup(&args).await?;
    let store = args.rule_store();

    if args.once {
        let res = reconcile::reconcile(&store, &config.cluster_range).await;
        return match exit_code(&res) {
            exitcode::OK => Ok(()),
            code => Err(code),
        };
    }

    let mut ctrlc_receiver = ctrlc_channel().await?;
    loop_daemon(&mut ctrlc_receiver, &store, &config).await
}

async fn loop_daemon<S>(
    ctrlc_receiver: &mut mpsc::Receiver<()>,
    store: &S,
    config: &Config,
) -> Result<(), exitcode::ExitCode>
where
    S: RuleStore,
{
    tracing::info!("main service loop beginning");
    let mut ticker = time::interval_at(time::Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            Some(_) = ctrlc_receiver.recv() => {
                tracing::info!("initiate shutdown");
                return Ok(());
            },
            _ = ticker.tick() => {
                let res = reconcile::reconcile(store, &config.cluster_range).await;
                if let Err(err) = &res {
                    tracing::error!(error = %err, "skipping check cycle");
                }
            }
        }
    }
}

/// Exit status of a single check cycle.
fn exit_code(res: &Result<Outcome, reconcile::Error>) -> exitcode::ExitCode {
    match res {
        Ok(Outcome::Compliant(_)) | Ok(Outcome::Repaired { .. }) => exitcode::OK,
        Ok(Outcome::RepairInapplicable(_)) | Ok(Outcome::RepairUnverified(_)) => exitcode::DATAERR,
        Err(err) => {
            tracing::error!(error = %err, "check cycle failed");
            exitcode::UNAVAILABLE
        }
    }
}

/// The engine is synchronous and the only I/O is two subprocesses per cycle,
/// so a single thread is enough.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = cli::parse();

    match &args.log_file {
        Some(path) => {
            if let Err(e) = logging::setup_log_file(path) {
                eprintln!("failed to open log file {}: {e}", path.display());
                process::exit(exitcode::CANTCREAT);
            }
        }
        None => logging::setup_stdout(),
    }
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting {}",
        env!("CARGO_PKG_NAME")
    );

    match daemon(args).await {
        Ok(_) => (),
        Err(exitcode::OK) => (),
        Err(code) => {
            tracing::warn!("abnormal exit");
            process::exit(code);
        }
    }
}
