//! Show or save the effective configuration.

use fallwatch_common::config::{config_file_path, AppConfig};

pub fn run(config: AppConfig, defaults: bool, save: bool) -> anyhow::Result<()> {
    let mut shown = if defaults { AppConfig::default() } else { config };
    shown.validate()?;

    if save {
        shown.save()?;
        println!("Saved to {}", config_file_path().display());
        return Ok(());
    }

    if let Some(telegram) = shown.notify.telegram.as_mut() {
        if !telegram.bot_token.is_empty() {
            telegram.bot_token = "<redacted>".to_string();
        }
    }
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}
