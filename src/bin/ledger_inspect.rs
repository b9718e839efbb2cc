use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use zsxq_relay::ledger::SentLedger;

#[derive(Parser, Debug)]
#[command(about = "Print the delivered-message ledger by day")]
struct Args {
    /// Path to the ledger JSON file
    #[arg(long, default_value = "sent_messages.json")]
    ledger: PathBuf,

    /// Also print every identity, not just per-day counts
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if !args.ledger.exists() {
        bail!("ledger not found: {}", args.ledger.display());
    }

    let ledger = SentLedger::try_load(&args.ledger)
        .with_context(|| format!("failed to read ledger {}", args.ledger.display()))?;
    println!("Ledger: {}", args.ledger.display());
    for (day, ids) in ledger.buckets() {
        println!("  {} -> {} delivered", day, ids.len());
        if args.verbose {
            for id in ids {
                println!("    {}", id);
            }
        }
    }
    Ok(())
}
