//! The cross-chain operator.
//!
//! The scheduler shell that hosts a [`ControlPlane`]. It periodically fails connections that
//! stopped sending heartbeats and expires transfers nobody claimed in time.
//!
//! The binary exposes no API of its own, so nothing here opens connections or records deposits.
//! Until a host process drives the managers, every maintenance tick finds nothing to do.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use tokio::{runtime, time};
use tracing::{debug, info};
use xchain_common::logging::{self, LoggerConfig};
use xchain_control_plane::ControlPlane;
use xchain_primitives::verifier::SchnorrVerifier;

mod args;
mod config;
mod constants;

use args::Cli;
use config::Config;

fn main() -> anyhow::Result<()> {
    logging::init(LoggerConfig::with_base_name("xchain-operator"));

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    debug!(?config, "loaded config");

    let interval = cli
        .interval_secs
        .map(Duration::from_secs)
        .unwrap_or(config.maintenance_interval);
    anyhow::ensure!(!interval.is_zero(), "maintenance interval must be greater than zero");

    let runtime = runtime::Builder::new_multi_thread()
        .worker_threads(config.num_threads)
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    let plane = ControlPlane::new(config.control_plane, Arc::new(SchnorrVerifier))
        .context("failed to build control plane")?;
    info!(?interval, once = cli.once, "starting operator");

    runtime.block_on(run(plane, interval, cli.once));

    info!("operator shutdown complete");
    Ok(())
}

/// Drives [`ControlPlane::run_maintenance`] on `interval` until Ctrl-C, or a single time when
/// `once` is set. This loop only schedules; the entities it maintains are created by whatever
/// embeds the control plane.
async fn run(plane: ControlPlane, interval: Duration, once: bool) {
    if once {
        maintain(&plane);
        return;
    }

    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
                break;
            }
            _ = ticker.tick() => maintain(&plane),
        }
    }
}

fn maintain(plane: &ControlPlane) {
    let report = plane.run_maintenance(chrono::Utc::now());
    debug!(
        stale = report.stale_connections.len(),
        expired = report.expired_transfers.len(),
        "maintenance tick"
    );
}
