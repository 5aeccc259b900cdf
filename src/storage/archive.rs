//! Directory-backed crawl archive
//!
//! An archive directory holds three files:
//!
//! | File | Content |
//! |------|---------|
//! | `domain.json` | The crawl root and creation time |
//! | `results.jsonl` | One JSON [`CrawlResult`] per line, append-only |
//! | `pending.json` | JSON array of URIs still to load, replaced on each checkpoint |

use crate::crawler::CrawlResult;
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

const DOMAIN_FILE: &str = "domain.json";
const RESULTS_FILE: &str = "results.jsonl";
const PENDING_FILE: &str = "pending.json";
const PENDING_TMP_FILE: &str = "pending.json.tmp";

/// Content of `domain.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRecord {
    pub domain: Url,
    pub created_at: DateTime<Utc>,
}

/// Everything read back from an archive directory
#[derive(Debug)]
pub struct RestoredCrawl {
    /// The reopened archive, ready for further checkpoints
    pub archive: DirectoryArchive,
    /// Every logged result, keyed by URI
    pub results: HashMap<Url, CrawlResult>,
    /// URIs whose result carries no error
    pub discovered: HashSet<Url>,
    /// URIs whose result carries an error
    pub failed: HashSet<Url>,
    /// URIs that were still to load at the last checkpoint
    pub pending: Vec<Url>,
}

/// Checkpoint store persisting a crawl into a directory
#[derive(Debug)]
pub struct DirectoryArchive {
    dir: PathBuf,
    domain: Url,
    buffer: Mutex<Vec<CrawlResult>>,
    /// Serializes checkpoints; held for the whole file sequence
    writer: Mutex<()>,
}

impl DirectoryArchive {
    /// Starts a new archive for `domain` in the existing directory `dir`
    ///
    /// Any archive previously stored in `dir` is replaced.
    pub fn create(domain: &Url, dir: &Path) -> StorageResult<Self> {
        if !dir.is_dir() {
            return Err(StorageError::NotADirectory(dir.to_path_buf()));
        }

        let record = DomainRecord {
            domain: domain.clone(),
            created_at: Utc::now(),
        };
        fs::write(dir.join(DOMAIN_FILE), serde_json::to_vec_pretty(&record)?)?;
        fs::write(dir.join(RESULTS_FILE), b"")?;

        let pending = dir.join(PENDING_FILE);
        if pending.exists() {
            fs::remove_file(&pending)?;
        }

        info!("Created archive for {} in {}", domain, dir.display());

        Ok(Self::with_domain(dir, domain.clone()))
    }

    /// Reopens the archive stored in `dir`
    ///
    /// A final log line without its terminating newline is a torn write from
    /// an interrupted checkpoint; it is dropped and the log is truncated to
    /// the last complete record. Any other malformed line is an error.
    pub fn restore(dir: &Path) -> StorageResult<RestoredCrawl> {
        if !dir.is_dir() {
            return Err(StorageError::NotADirectory(dir.to_path_buf()));
        }

        let domain_path = dir.join(DOMAIN_FILE);
        let raw_domain = fs::read(&domain_path).map_err(|e| corrupt(&domain_path, e))?;
        let record: DomainRecord =
            serde_json::from_slice(&raw_domain).map_err(|e| corrupt(&domain_path, e))?;

        let log_path = dir.join(RESULTS_FILE);
        let (entries, valid_len) = read_log(&log_path)?;

        let mut results = HashMap::new();
        let mut discovered = HashSet::new();
        let mut failed = HashSet::new();
        for result in entries {
            if results.contains_key(&result.uri) {
                debug!("Ignoring repeated log record for {}", result.uri);
                continue;
            }
            if result.is_failure() {
                failed.insert(result.uri.clone());
            } else {
                discovered.insert(result.uri.clone());
            }
            results.insert(result.uri.clone(), result);
        }

        if let Some(len) = valid_len {
            let file = OpenOptions::new().write(true).open(&log_path)?;
            file.set_len(len)?;
            file.sync_all()?;
        }

        let pending_path = dir.join(PENDING_FILE);
        let pending: Vec<Url> = match fs::read(&pending_path) {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| corrupt(&pending_path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        // A URI can be both pending and logged; the logged outcome wins
        let mut seen = HashSet::new();
        let pending: Vec<Url> = pending
            .into_iter()
            .filter(|uri| !results.contains_key(uri) && seen.insert(uri.clone()))
            .collect();

        info!(
            "Restored archive for {}: {} discovered, {} failed, {} pending",
            record.domain,
            discovered.len(),
            failed.len(),
            pending.len()
        );

        Ok(RestoredCrawl {
            archive: Self::with_domain(dir, record.domain),
            results,
            discovered,
            failed,
            pending,
        })
    }

    fn with_domain(dir: &Path, domain: Url) -> Self {
        Self {
            dir: dir.to_path_buf(),
            domain,
            buffer: Mutex::new(Vec::new()),
            writer: Mutex::new(()),
        }
    }

    fn write_checkpoint(&self, pending: &[Url], records: &[CrawlResult]) -> StorageResult<()> {
        let tmp_path = self.dir.join(PENDING_TMP_FILE);
        fs::write(&tmp_path, serde_json::to_vec(pending)?)?;

        let log_path = self.dir.join(RESULTS_FILE);
        let mut log = OpenOptions::new().append(true).open(&log_path)?;
        let original_len = log.metadata()?.len();

        let appended = append_records(&mut log, records)
            .and_then(|_| fs::rename(&tmp_path, self.dir.join(PENDING_FILE)).map_err(Into::into));

        if let Err(e) = appended {
            if let Err(rollback) = log.set_len(original_len) {
                warn!(
                    "Failed to roll back {} to {} bytes: {}",
                    log_path.display(),
                    original_len,
                    rollback
                );
            }
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        Ok(())
    }
}

impl CheckpointStore for DirectoryArchive {
    fn domain(&self) -> &Url {
        &self.domain
    }

    fn put(&self, result: &CrawlResult) {
        lock(&self.buffer).push(result.clone());
    }

    fn checkpoint(&self, pending: &dyn Fn() -> Vec<Url>) -> StorageResult<()> {
        let _writer = lock(&self.writer);

        let records: Vec<CrawlResult> = lock(&self.buffer).clone();
        let mut pending = pending();

        // A result buffered after the capture may already have left the
        // pending set; keep it pending until the next checkpoint logs it
        {
            let buffer = lock(&self.buffer);
            let mut known: HashSet<&Url> = pending.iter().collect();
            let late: Vec<Url> = buffer[records.len()..]
                .iter()
                .filter(|r| known.insert(&r.uri))
                .map(|r| r.uri.clone())
                .collect();
            pending.extend(late);
        }

        self.write_checkpoint(&pending, &records)?;

        lock(&self.buffer).drain(..records.len());

        info!(
            "Checkpoint written to {}: {} results, {} pending",
            self.dir.display(),
            records.len(),
            pending.len()
        );
        Ok(())
    }

    fn buffered(&self) -> usize {
        lock(&self.buffer).len()
    }
}

fn append_records(log: &mut fs::File, records: &[CrawlResult]) -> StorageResult<()> {
    let mut encoded = Vec::new();
    for record in records {
        serde_json::to_writer(&mut encoded, record)?;
        encoded.push(b'\n');
    }
    log.write_all(&encoded)?;
    log.sync_all()?;
    Ok(())
}

/// Reads every record of the result log
///
/// Returns the records and, when a torn trailing record was dropped, the
/// length the log should be truncated to.
fn read_log(path: &Path) -> StorageResult<(Vec<CrawlResult>, Option<u64>)> {
    let raw = fs::read(path).map_err(|e| corrupt(path, e))?;

    let mut records = Vec::new();
    let mut offset = 0usize;
    let mut line_no = 0usize;

    while offset < raw.len() {
        line_no += 1;
        // Every record is written with its newline, so an unterminated tail
        // is a torn write even when it happens to parse
        let Some(end) = raw[offset..].iter().position(|&b| b == b'\n') else {
            debug!(
                "Dropping unterminated record at line {} of {}",
                line_no,
                path.display()
            );
            return Ok((records, Some(offset as u64)));
        };
        let line = &raw[offset..offset + end];

        if !line.iter().all(u8::is_ascii_whitespace) {
            let record = serde_json::from_slice::<CrawlResult>(line).map_err(|e| {
                StorageError::CorruptArchive {
                    path: path.to_path_buf(),
                    reason: format!("line {}: {}", line_no, e),
                }
            })?;
            records.push(record);
        }

        offset += end + 1;
    }

    Ok((records, None))
}

fn corrupt(path: &Path, e: impl std::fmt::Display) -> StorageError {
    StorageError::CorruptArchive {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
