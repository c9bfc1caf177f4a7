//! Send one test alert through the configured sinks.

use fallwatch_common::clock::caption_timestamp;
use fallwatch_common::config::AppConfig;
use fallwatch_notify::build_sinks;

pub async fn run(config: &AppConfig, message: String) -> anyhow::Result<()> {
    let sinks = build_sinks(&config.notify, false)?;
    let text = format!("{message} ({})", caption_timestamp());

    let mut failures = 0;
    for sink in &sinks {
        match sink.send_message(&text).await {
            Ok(()) => println!("[OK] {}: message sent", sink.name()),
            Err(e) => {
                println!("[FAIL] {}: {e}", sink.name());
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} sink(s) failed");
    }
    Ok(())
}
