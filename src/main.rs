use std::sync::Arc;

use clap::Parser;
use eyre::{Result, WrapErr};
use log::{info, warn};

use ytserv::config::{Config, Settings};
use ytserv::driver::{self, Exit};
use ytserv::irc::TcpConnector;
use ytserv::youtube::DataApi;

mod cli;

use cli::Cli;

fn setup_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stdout)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    // Load config file (non-fatal if missing/invalid)
    let config = Config::load().unwrap_or_else(|e| {
        warn!("Ignoring config file: {e:#}");
        Config::default()
    });

    let mut settings = Settings::new(cli.server, cli.channel, cli.nickname, cli.api_key).with_config(&config);
    if let Some(port) = cli.port {
        settings.port = port;
    }

    let lookup = DataApi::new(&settings.api_key, &settings.locale, settings.lookup_timeout)
        .wrap_err("failed to build HTTP client")?;

    match driver::run(&settings, &TcpConnector, Arc::new(lookup), shutdown_signal()).await {
        Exit::Finished => info!("Session finished"),
        Exit::Interrupted => info!("Stopped by operator"),
    }

    Ok(())
}
