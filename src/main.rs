use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use zsxq_relay::config;
use zsxq_relay::feed::FeedClient;
use zsxq_relay::feishu::FeishuClient;
use zsxq_relay::ledger::SentLedger;
use zsxq_relay::relay;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Relay today's ZSXQ posts from one author to a Feishu bot, once each"
)]
struct Args {
    /// Path to YAML config file (defaults to ./config.yaml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fetch and print matching messages without sending or recording them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(args.config.as_deref()).context("failed to load configuration")?;
    cfg.ensure_dirs()?;

    let feed = FeedClient::new(cfg.zsxq.api_url.clone(), cfg.zsxq.cookies.clone())?;
    let filter = cfg.feed_filter();
    let mut ledger = SentLedger::load(cfg.ledger_path());

    if args.dry_run {
        match relay::preview(&feed, &filter, &ledger).await {
            Ok(texts) => {
                info!(matched = texts.len(), "dry run");
                for text in texts {
                    println!("{}\n", text);
                }
            }
            Err(err) => error!(?err, "failed to fetch feed"),
        }
        return Ok(());
    }

    let notifier = FeishuClient::new(cfg.feishu.webhook_url.clone(), cfg.feishu.sign_key.clone())?;

    // A failed fetch ends this run only; the scheduler will try again.
    match relay::run_once(&feed, &notifier, &filter, &mut ledger, &cfg.run_settings()).await {
        Ok(report) => info!(
            sent = report.sent,
            matched = report.matched,
            failed = report.failed,
            "relay finished"
        ),
        Err(err) => error!(?err, "failed to fetch feed; nothing delivered"),
    }
    Ok(())
}
