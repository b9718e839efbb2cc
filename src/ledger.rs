//! Date-partitioned record of delivered message identities.
//!
//! On disk the ledger is a JSON object keyed by local `YYYY-MM-DD` dates whose
//! values are arrays of identities delivered that day. The whole file is
//! rewritten after every mutation, via a temp file and a rename, so a reader
//! never observes a half-written ledger.
//!
//! Dedup only ever consults a single day's bucket.

use chrono::{Duration, Local, NaiveDate};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_RETENTION_DAYS: u32 = 7;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("ledger JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default)]
pub struct SentLedger {
    path: Option<PathBuf>,
    buckets: BTreeMap<String, Vec<String>>,
}

impl SentLedger {
    /// Ledger with no backing file; mutations stay in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the ledger at `path`. A missing or unreadable file yields an empty
    /// ledger that will still be written back to `path`.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::try_load(&path) {
            Ok(ledger) => ledger,
            Err(err) => {
                warn!(?err, path = %path.display(), "failed to load ledger; starting empty");
                Self {
                    path: Some(path),
                    buckets: BTreeMap::new(),
                }
            }
        }
    }

    /// Like [`SentLedger::load`], but a corrupt or unreadable file is an error.
    /// A missing file is still an empty ledger.
    pub fn try_load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let buckets = match read_buckets(&path) {
            Ok(buckets) => buckets,
            Err(LedgerError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no ledger yet; starting empty");
                BTreeMap::new()
            }
            Err(err) => return Err(err),
        };
        Ok(Self {
            path: Some(path),
            buckets,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn buckets(&self) -> &BTreeMap<String, Vec<String>> {
        &self.buckets
    }

    /// Whether `identity` was delivered today (local wall-clock date).
    pub fn contains(&self, identity: &str) -> bool {
        self.contains_on(today(), identity)
    }

    pub fn contains_on(&self, date: NaiveDate, identity: &str) -> bool {
        self.buckets
            .get(&date_key(date))
            .map(|ids| ids.iter().any(|id| id == identity))
            .unwrap_or(false)
    }

    /// Add `identity` to today's bucket and persist.
    pub fn record(&mut self, identity: &str) {
        self.record_on(today(), identity)
    }

    /// Add `identity` to `date`'s bucket and persist. A write failure is logged
    /// and otherwise ignored: the in-memory ledger stays authoritative.
    pub fn record_on(&mut self, date: NaiveDate, identity: &str) {
        let bucket = self.buckets.entry(date_key(date)).or_default();
        if bucket.iter().any(|id| id == identity) {
            return;
        }
        bucket.push(identity.to_string());
        self.persist_logged();
    }

    /// Drop buckets dated strictly before `today - days`. Returns how many were
    /// removed; the file is rewritten only when that is non-zero.
    pub fn prune_older_than(&mut self, days: u32) -> usize {
        self.prune_older_than_from(today(), days)
    }

    pub fn prune_older_than_from(&mut self, today: NaiveDate, days: u32) -> usize {
        let cutoff = date_key(today - Duration::days(i64::from(days)));
        let before = self.buckets.len();
        // Keys are zero-padded ISO dates, so lexical order is date order.
        self.buckets.retain(|key, _| key.as_str() >= cutoff.as_str());
        let removed = before - self.buckets.len();
        if removed > 0 {
            info!(removed, %cutoff, "pruned old ledger buckets");
            self.persist_logged();
        }
        removed
    }

    /// Write the whole ledger to its backing file, if any.
    pub fn save(&self) -> Result<(), LedgerError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let body = serde_json::to_vec_pretty(&self.buckets)?;
        let tmp = tmp_path(path);
        let written = fs::File::create(&tmp).and_then(|mut file| {
            file.write_all(&body)?;
            file.sync_all()?;
            drop(file);
            fs::rename(&tmp, path)
        });
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }

    fn persist_logged(&self) {
        if let Err(err) = self.save() {
            warn!(?err, "failed to persist ledger; continuing with in-memory state");
        }
    }
}

fn read_buckets(path: &Path) -> Result<BTreeMap<String, Vec<String>>, LedgerError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
