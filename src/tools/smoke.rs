use clap::Args;
use color_eyre::Result;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::info;

use crate::config::AppConfig;
use crate::mqtt::MQTTMessage;
use crate::server::command::{CMD_ADD_NODE, CMD_CANCEL};

/// (pause in steps, command code, nonce), sent in order
const SEQUENCE: [(u32, i64, &str); 3] = [
    (1, -1, "aaa"),
    (1, CMD_ADD_NODE, "bbb"),
    (4, CMD_CANCEL, "ccc"),
];
const TRAILING_STEPS: u32 = 1;

#[derive(Args, Debug)]
pub struct SmokeCommand {
    /// Length of one pause step in seconds
    #[arg(long, default_value = "5")]
    pub step_secs: u64,
}

/// Sends an unsupported command, a node add and a cancel against a running
/// gateway, printing everything seen on the broker meanwhile.
pub async fn execute(cmd: SmokeCommand, config: AppConfig) -> Result<()> {
    println!("waiting for connected");
    let (link, mut inbound) = super::connect(&config, "smoke", vec!["#".to_string()]).await?;
    println!("is connected");

    let step = Duration::from_secs(cmd.step_secs);
    for (steps, command, nonce) in SEQUENCE {
        print_for(&mut inbound, step * steps).await;
        info!("Sending command {} (nonce {})", command, nonce);
        println!("> command {} nonce {}", command, nonce);
        super::send_command(&link, &config, command, nonce).await?;
    }
    print_for(&mut inbound, step * TRAILING_STEPS).await;

    link.shutdown().await;
    Ok(())
}

async fn print_for(inbound: &mut mpsc::Receiver<MQTTMessage>, duration: Duration) {
    let deadline = Instant::now() + duration;
    loop {
        tokio::select! {
            _ = sleep_until(deadline) => return,
            msg = inbound.recv() => match msg {
                Some(msg) => println!("message >> {}", msg.render()),
                None => {
                    sleep_until(deadline).await;
                    return;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn print_for_returns_at_deadline() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(MQTTMessage::from_topic("ozw/action/return", "{}"))
            .await
            .unwrap();

        let start = Instant::now();
        print_for(&mut rx, Duration::from_secs(3)).await;
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn sequence_spans_seven_steps() {
        let total: u32 = SEQUENCE.iter().map(|(steps, _, _)| steps).sum::<u32>() + TRAILING_STEPS;
        assert_eq!(total, 7);
        assert_eq!(SEQUENCE.map(|(_, _, nonce)| nonce), ["aaa", "bbb", "ccc"]);
    }
}
