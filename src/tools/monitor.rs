use clap::Args;
use color_eyre::Result;
use tracing::{error, info};

use crate::config::AppConfig;

#[derive(Args, Debug)]
pub struct MonitorCommand {
    /// Topic filters to subscribe to
    #[arg(default_value = "#")]
    pub topics: Vec<String>,
}

/// Prints every message received on the given topics until Ctrl-C.
pub async fn execute(cmd: MonitorCommand, config: AppConfig) -> Result<()> {
    let (link, mut inbound) = super::connect(&config, "monitor", cmd.topics.clone()).await?;
    info!("Monitoring {}", cmd.topics.join(", "));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
            msg = inbound.recv() => match msg {
                Some(msg) => println!("{}", msg.render()),
                None => break,
            },
        }
    }

    link.shutdown().await;
    Ok(())
}
