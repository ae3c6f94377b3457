use clap::Args;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::AppConfig;

#[derive(Args, Debug)]
pub struct ReplayCommand {
    /// Newline-delimited JSON log of `{topic, payload}` records
    pub file: PathBuf,

    /// Only records whose topic starts with this prefix are replayed
    #[arg(long, default_value = "ozw/")]
    pub prefix: String,

    /// Pause after each published record
    #[arg(long, default_value = "500")]
    pub delay_ms: u64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ReplayRecord {
    pub topic: String,
    pub payload: serde_json::Value,
}

pub fn parse_record(line: &str) -> Result<ReplayRecord, serde_json::Error> {
    serde_json::from_str(line)
}

/// Records of `content` selected for replay, in file order.
///
/// Blank lines are ignored; malformed ones are skipped with a warning.
pub fn select_records(content: &str, prefix: &str) -> Vec<ReplayRecord> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(n, line)| match parse_record(line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed line {}: {}", n + 1, e);
                None
            }
        })
        .filter(|record| record.topic.starts_with(prefix))
        .collect()
}

pub async fn execute(cmd: ReplayCommand, config: AppConfig) -> Result<()> {
    let content = tokio::fs::read_to_string(&cmd.file)
        .await
        .map_err(|e| eyre!("Failed to read log file {}: {}", cmd.file.display(), e))?;
    let records = select_records(&content, &cmd.prefix);
    info!(
        "Replaying {} records from {}",
        records.len(),
        cmd.file.display()
    );

    let (link, _inbound) = super::connect(&config, "replay", Vec::new()).await?;
    let delay = Duration::from_millis(cmd.delay_ms);

    for record in &records {
        println!("> {} {}", record.topic, record.payload);
        link.publish_json(&record.topic, &record.payload)
            .await
            .map_err(|e| eyre!("Failed to publish to {}: {}", record.topic, e))?;
        tokio::time::sleep(delay).await;
    }

    link.shutdown().await;
    Ok(())
}
