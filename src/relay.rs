//! One pass of the relay: fetch, filter, then deliver and record each match in
//! turn. A message is recorded in the ledger only after the chat acknowledged
//! it, so an interrupted run never marks an undelivered message as sent.

use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::feed::{FeedFilter, FeedSource, FetchError};
use crate::feishu::Notifier;
use crate::format::format_message;
use crate::identity::identity_of;
use crate::ledger::{SentLedger, DEFAULT_RETENTION_DAYS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Pause between two consecutive delivery attempts.
    pub send_interval: Duration,
    pub retention_days: u32,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_secs(1),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub pruned: usize,
    pub matched: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Run the pipeline once. Only a failed fetch is an error; delivery failures
/// are counted and left unrecorded so the next run retries them.
#[instrument(skip_all)]
pub async fn run_once(
    feed: &dyn FeedSource,
    notifier: &dyn Notifier,
    filter: &FeedFilter,
    ledger: &mut SentLedger,
    settings: &RunSettings,
) -> Result<RunReport, FetchError> {
    let mut report = RunReport {
        pruned: ledger.prune_older_than(settings.retention_days),
        ..Default::default()
    };

    info!("fetching feed");
    let payload = feed.fetch().await?;

    let messages = filter.filter(&payload, ledger);
    report.matched = messages.len();
    info!(matched = report.matched, "filtered feed");

    for (i, msg) in messages.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(settings.send_interval).await;
        }
        let text = format_message(msg);
        match notifier.send_text(&text).await {
            Ok(()) => {
                ledger.record(&identity_of(msg));
                report.sent += 1;
            }
            Err(err) => {
                warn!(?err, index = i + 1, create_time = %msg.create_time, "delivery failed");
                report.failed += 1;
            }
        }
    }

    info!(sent = report.sent, failed = report.failed, "run complete");
    Ok(report)
}

/// Fetch and filter without delivering or touching the ledger file.
/// Returns the formatted texts that a real run would send.
#[instrument(skip_all)]
pub async fn preview(
    feed: &dyn FeedSource,
    filter: &FeedFilter,
    ledger: &SentLedger,
) -> Result<Vec<String>, FetchError> {
    let payload = feed.fetch().await?;
    Ok(filter
        .filter(&payload, ledger)
        .iter()
        .map(format_message)
        .collect())
}
