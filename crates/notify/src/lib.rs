//! Fallwatch Notification Delivery
//!
//! Alerts leave the frame loop through [`AlertDispatcher::submit`], which
//! never blocks. A background worker delivers each alert to every
//! configured [`NotificationSink`] with a bounded number of deliveries in
//! flight. Delivery failures are logged and counted, never retried.

pub mod dispatcher;
pub mod sink;
pub mod telegram;

use std::sync::Arc;
use std::time::Duration;

use fallwatch_common::config::NotifyConfig;
use fallwatch_common::error::FallwatchResult;

pub use dispatcher::{alert_message, photo_caption, AlertDispatcher, AlertJob, DispatchStats};
pub use sink::{LogSink, NotificationSink};
pub use telegram::TelegramSink;

/// Build the sinks described by `config`.
///
/// Without Telegram credentials, or with `dry_run`, alerts go to the log.
pub fn build_sinks(
    config: &NotifyConfig,
    dry_run: bool,
) -> FallwatchResult<Vec<Arc<dyn NotificationSink>>> {
    let sink: Arc<dyn NotificationSink> = match (&config.telegram, dry_run) {
        (Some(telegram), false) => {
            let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
            Arc::new(TelegramSink::new(telegram.clone(), timeout)?)
        }
        (Some(_), true) => {
            tracing::info!("Dry run: alerts will be logged, not sent");
            Arc::new(LogSink)
        }
        (None, _) => {
            tracing::info!("No Telegram credentials configured; alerts will be logged");
            Arc::new(LogSink)
        }
    };
    Ok(vec![sink])
}
