//! Parses command-line arguments for the operator.

use std::path::PathBuf;

use clap::{crate_version, Parser};

#[derive(Debug, Parser)]
#[clap(
    name = "xchain-operator",
    about = "Runs the cross-chain control plane and its maintenance loop",
    version = crate_version!()
)]
pub(crate) struct Cli {
    #[clap(
        long,
        short = 'c',
        help = "The file containing the configuration for the operator",
        default_value = "config.toml"
    )]
    pub config: PathBuf,

    #[clap(
        long,
        help = "Overrides the maintenance interval from the config file, in seconds",
        env = "XCHAIN_MAINTENANCE_INTERVAL_SECS"
    )]
    pub interval_secs: Option<u64>,

    #[clap(long, help = "Run a single maintenance pass and exit")]
    pub once: bool,
}
