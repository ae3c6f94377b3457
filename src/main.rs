pub mod config;
pub mod mqtt;
pub mod server;
pub mod simulation;
pub mod tools;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "ozw-mock")]
#[command(about = "Mock OpenZWave MQTT gateway and companion developer tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ~/.config/ozw-mock/config.toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the mock gateway until Ctrl-C
    Server(tools::server::ServerCommand),
    /// Print every message published on the broker
    Monitor(tools::monitor::MonitorCommand),
    /// Send a short scripted command sequence to a running gateway
    Smoke(tools::smoke::SmokeCommand),
    /// Republish a recorded message log
    Replay(tools::replay::ReplayCommand),
    /// Interactive command client
    Client,
    /// Write the sample configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    setup(level)?;

    if let Commands::InitConfig { force } = cli.command {
        let path = config::ensure_default_config(cli.config.as_deref(), force).await?;
        info!("Sample configuration written to {}", path.display());
        return Ok(());
    }

    let app_config = AppConfig::load(cli.config.as_deref()).await?;
    debug!("Using broker {}", app_config.broker.address());

    match cli.command {
        Commands::Server(cmd) => tools::server::execute(cmd, app_config).await,
        Commands::Monitor(cmd) => tools::monitor::execute(cmd, app_config).await,
        Commands::Smoke(cmd) => tools::smoke::execute(cmd, app_config).await,
        Commands::Replay(cmd) => tools::replay::execute(cmd, app_config).await,
        Commands::Client => tools::client::execute(app_config).await,
        Commands::InitConfig { .. } => Ok(()),
    }
}

fn setup(level: Level) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env(level);
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["ozw-mock", "replay", "log.json", "-v", "--delay-ms", "10"])
            .unwrap();
        assert!(cli.verbose);
        let Commands::Replay(cmd) = cli.command else {
            panic!("expected replay");
        };
        assert_eq!(cmd.delay_ms, 10);
        assert_eq!(cmd.prefix, "ozw/");
    }

    #[test]
    fn monitor_defaults_to_all_topics() {
        let cli = Cli::try_parse_from(["ozw-mock", "monitor"]).unwrap();
        let Commands::Monitor(cmd) = cli.command else {
            panic!("expected monitor");
        };
        assert_eq!(cmd.topics, vec!["#".to_string()]);
    }
}
