//! File-backed chain appender.
//!
//! `FileAppender` is the single writer for one log file.  Every append runs
//! "read tail, seal, write, sync" while holding two locks, so two callers can
//! never link to the same predecessor:
//!
//! - the appender's mutex, for threads sharing one handle
//! - an exclusive advisory lock on the log file itself (`flock` on Unix,
//!   `LockFileEx` on Windows), for separate handles and separate processes
//!
//! The file lock is advisory: a writer that bypasses `FileAppender` is not
//! excluded.
//!
//! The log file and its parent directories are created on first append.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fs2::FileExt;
use tracing::{debug, info};

use flightrec_contracts::{
    action::AgentAction,
    entry::{AuditEntry, GENESIS_HASH},
    error::{FlightError, FlightResult},
};
use flightrec_core::traits::{AuditSink, Clock, SystemClock};

use crate::chain::{is_hex_digest, seal};

/// Bytes read per step while scanning backwards for the last line.
const TAIL_CHUNK: u64 = 8 * 1024;

/// The append-only writer for one log file.
pub struct FileAppender {
    path: PathBuf,
    fsync: bool,
    clock: Arc<dyn Clock>,
    /// Serializes threads sharing this handle.
    writer: Mutex<()>,
}

/// The last record-bearing line of a log file.
struct Tail {
    /// Raw bytes of the last non-blank line, if any.
    line: Option<Vec<u8>>,
    /// False when the file is non-empty and its final byte is not `\n`.
    terminated: bool,
}

impl FileAppender {
    /// An appender for `path` using the system clock, syncing every append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fsync: true,
            clock: Arc::new(SystemClock),
            writer: Mutex::new(()),
        }
    }

    pub fn with_fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stamp, chain, and durably append one validated action.
    ///
    /// # Errors
    ///
    /// - `CorruptTail` when the last line of the log is not a valid record;
    ///   the chain is never silently restarted or forked
    /// - `AuditWriteFailed` for any I/O failure
    pub fn append(&self, action: AgentAction) -> FlightResult<AuditEntry> {
        let _writer = self.writer.lock().map_err(|e| FlightError::AuditWriteFailed {
            reason: format!("appender lock poisoned: {}", e),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                write_failed(format!(
                    "failed to create log directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| {
                write_failed(format!(
                    "failed to open audit log '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        // Held until `file` is dropped at the end of this call.
        file.lock_exclusive().map_err(|e| {
            write_failed(format!(
                "failed to lock audit log '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        let tail = read_tail(&mut file)
            .map_err(|e| write_failed(format!("failed to read log tail: {}", e)))?;
        let prev_hash = match &tail.line {
            None => GENESIS_HASH.to_string(),
            Some(raw) => tail_hash(&mut file, raw)?,
        };

        debug!(
            path = %self.path.display(),
            prev_hash = %prev_hash,
            "resolved log tail"
        );

        let entry = seal(action, self.clock.now(), &prev_hash);

        let mut line = Vec::with_capacity(512);
        if !tail.terminated {
            // Keep the previous record on its own line.
            line.push(b'\n');
        }
        serde_json::to_writer(&mut line, &entry)
            .map_err(|e| write_failed(format!("failed to serialize entry: {}", e)))?;
        line.push(b'\n');

        file.write_all(&line)
            .map_err(|e| write_failed(format!("failed to write to audit log: {}", e)))?;
        if self.fsync {
            file.sync_data()
                .map_err(|e| write_failed(format!("failed to sync audit log: {}", e)))?;
        }

        info!(
            agent = %entry.agent,
            hash = %entry.hash,
            prev_hash = %entry.prev_hash,
            "appended audit entry"
        );

        Ok(entry)
    }

    /// The hash of the current last record, or `None` for an empty or
    /// missing log.
    pub fn head(&self) -> FlightResult<Option<String>> {
        // A concurrent append, from this handle or any other, is either fully
        // visible or not at all.
        let _writer = self.writer.lock().map_err(|e| FlightError::LogReadFailed {
            reason: format!("appender lock poisoned: {}", e),
        })?;

        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(FlightError::LogReadFailed {
                    reason: format!("failed to open audit log '{}': {}", self.path.display(), e),
                })
            }
        };

        file.lock_shared().map_err(|e| FlightError::LogReadFailed {
            reason: format!("failed to lock audit log '{}': {}", self.path.display(), e),
        })?;

        let tail = read_tail(&mut file).map_err(|e| FlightError::LogReadFailed {
            reason: format!("failed to read log tail: {}", e),
        })?;
        match &tail.line {
            None => Ok(None),
            Some(raw) => tail_hash(&mut file, raw).map(Some),
        }
    }
}

impl AuditSink for FileAppender {
    fn append(&self, action: AgentAction) -> FlightResult<AuditEntry> {
        FileAppender::append(self, action)
    }

    fn head(&self) -> FlightResult<Option<String>> {
        FileAppender::head(self)
    }
}

fn write_failed(reason: String) -> FlightError {
    FlightError::AuditWriteFailed { reason }
}

/// Parse the last line and return its hash, refusing anything that cannot
/// be linked to.
fn tail_hash(file: &mut File, raw: &[u8]) -> FlightResult<String> {
    let entry: AuditEntry = match serde_json::from_slice(raw) {
        Ok(entry) => entry,
        Err(e) => return Err(corrupt_tail(file, e.to_string())),
    };
    if !is_hex_digest(&entry.hash) {
        return Err(corrupt_tail(
            file,
            format!("'_hash' is not a 64-character hex digest: '{}'", entry.hash),
        ));
    }
    Ok(entry.hash)
}

fn corrupt_tail(file: &mut File, reason: String) -> FlightError {
    FlightError::CorruptTail {
        line: count_lines(file).unwrap_or(0),
        reason,
    }
}

/// Locate the last non-blank line by reading backwards from the end.
fn read_tail(file: &mut File) -> io::Result<Tail> {
    let len = file.seek(SeekFrom::End(0))?;
    if len == 0 {
        return Ok(Tail {
            line: None,
            terminated: true,
        });
    }

    let mut buf: Vec<u8> = Vec::new();
    let mut pos = len;
    loop {
        let start = pos.saturating_sub(TAIL_CHUNK);
        let mut chunk = vec![0u8; (pos - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&buf);
        buf = chunk;
        pos = start;

        let terminated = buf.last() == Some(&b'\n');
        let content_end = buf
            .iter()
            .rposition(|b| !b.is_ascii_whitespace())
            .map(|i| i + 1);

        match content_end {
            Some(end) => {
                if let Some(newline) = buf[..end].iter().rposition(|&b| b == b'\n') {
                    return Ok(Tail {
                        line: Some(buf[newline + 1..end].to_vec()),
                        terminated,
                    });
                }
                if pos == 0 {
                    return Ok(Tail {
                        line: Some(buf[..end].to_vec()),
                        terminated,
                    });
                }
            }
            None if pos == 0 => {
                return Ok(Tail {
                    line: None,
                    terminated,
                })
            }
            None => {}
        }
    }
}

/// 1-based number of the last non-blank line, for error reports.
fn count_lines(file: &mut File) -> io::Result<usize> {
    file.seek(SeekFrom::Start(0))?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    let last = contents
        .split(|&b| b == b'\n')
        .enumerate()
        .filter(|(_, line)| !line.iter().all(u8::is_ascii_whitespace))
        .map(|(i, _)| i + 1)
        .last()
        .unwrap_or(0);
    Ok(last)
}
