use std::io::{Read, Write};

use anyhow::Context;

use crate::config::RelayConfig;
use crate::decision::Verdict;
use crate::event::EventRecord;
use crate::relay::Relay;

/// Read an event record from stdin and forward it to the companion app.
///
/// Waits for a decision when `wait` is set or the event is a permission
/// request, and prints the hook output for allow/deny. "Ask" and "nobody
/// answered" both print nothing so the assistant shows its own prompt.
pub async fn run_send(config: RelayConfig, wait: bool) -> anyhow::Result<()> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read event from stdin")?;
    let mut event: EventRecord =
        serde_json::from_str(input.trim()).context("stdin is not a valid event record")?;

    event.fill_process_info().await;
    let await_reply = wait || event.requires_decision();

    let relay = Relay::new(config);
    let reply = relay.dispatch(&event, await_reply).await;
    if !await_reply {
        return Ok(());
    }

    let verdict = Verdict::from_reply(reply);
    tracing::debug!(?verdict, "permission outcome");
    if let Some(output) = verdict.hook_output() {
        let json = serde_json::to_string(&output)?;
        let mut stdout = std::io::stdout();
        writeln!(stdout, "{}", json)?;
        stdout.flush()?;
    }
    Ok(())
}
