//! `cis` command-line tool.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use cis_cli::{exit_code, load_config, Args, Session};

fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize tracing; RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    if let Err(err) = run(&args) {
        error!("{:#}", err);
        std::process::exit(exit_code(&err));
    }
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    info!(
        missing_for_missing_sample = config.default_missing_data_for_missing_sample,
        point_kernel = %config.default_point_kernel,
        gridded_kernel = %config.default_gridded_kernel,
        "Loaded configuration"
    );

    Session::new(config).run(&args.command, &args.output)
}
