mod catalog;
mod cli;
mod paths;
mod report;
mod sorted;
mod source;

use anyhow::Result;
use clap::Parser; // needed for Cli::parse()
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::commands::run_cli;
use cli::opts::Cli;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();
    init_tracing(args.verbose);

    let rt = Runtime::new()?;
    rt.block_on(run_cli(args))
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "cardusage=debug,cardusage_core=debug,cardusage_sqlite=debug"
    } else {
        "cardusage=info,cardusage_core=info,cardusage_sqlite=warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
