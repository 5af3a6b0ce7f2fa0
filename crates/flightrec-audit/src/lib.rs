//! # flightrec-audit
//!
//! Append-only, SHA-256 hash-chained log of AI-agent decisions.
//!
//! ## Overview
//!
//! Every recorded action becomes an `AuditEntry` whose `_prevHash` is the
//! `_hash` of the entry before it.  The log is one JSON record per line.
//!
//! - [`FileAppender`] — the single writer; serializes all appends
//! - [`verify_file`] — replays the whole log and reports every broken link
//!   or recomputed-digest mismatch, without stopping at the first one
//! - [`recent`] / [`query`] — best-effort newest-first reads for dashboards
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use flightrec_audit::{FileAppender, verify_file, recent};
//!
//! let appender = Arc::new(FileAppender::new(".agent/logs/flight_recorder.jsonl"));
//! appender.append(request.validate()?)?;
//!
//! let report = verify_file(appender.path())?;
//! assert!(report.is_ok());
//! let latest = recent(appender.path(), 20)?;
//! ```

pub mod appender;
pub mod chain;
pub mod memory;
pub mod reader;
pub mod verifier;

pub use appender::FileAppender;
pub use chain::{canonical_bytes, entry_digest, is_hex_digest, sha256_hex, CANONICAL_TAG};
pub use memory::InMemoryAppender;
pub use reader::{query, recent, RecentQuery, DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT};
pub use verifier::{verify_entries, verify_file, verify_reader};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::thread;

    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;

    use flightrec_contracts::{
        action::{AgentAction, AppendRequest},
        entry::{AuditEntry, GENESIS_HASH},
        error::FlightError,
        verify::{ChainStatus, FindingKind},
    };
    use flightrec_core::traits::{AuditSink, ManualClock};

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn action(agent: &str, intent: &str, score: f64, result: &str) -> AgentAction {
        AppendRequest {
            agent: agent.to_string(),
            intent: intent.to_string(),
            trust_score: score,
            result: Some(result.to_string()),
            ..AppendRequest::default()
        }
        .validate()
        .unwrap()
    }

    /// A temp directory plus an appender whose clock advances only when told.
    fn setup() -> (TempDir, PathBuf, FileAppender, Arc<ManualClock>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("flight_recorder.jsonl");
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        ));
        let appender = FileAppender::new(&path)
            .with_fsync(false)
            .with_clock(clock.clone());
        (dir, path, appender, clock)
    }

    /// Append `n` entries, one millisecond apart, with results `ok-1..=ok-n`.
    fn append_n(appender: &FileAppender, clock: &ManualClock, n: usize) -> Vec<AuditEntry> {
        (1..=n)
            .map(|i| {
                clock.advance(Duration::milliseconds(1));
                appender
                    .append(action("AGENT", &format!("step {}", i), 5.0, &format!("ok-{}", i)))
                    .unwrap()
            })
            .collect()
    }

    fn rewrite_line(path: &Path, line: usize, edit: impl Fn(&str) -> String) {
        let contents = fs::read_to_string(path).unwrap();
        let rewritten: Vec<String> = contents
            .lines()
            .enumerate()
            .map(|(i, l)| if i + 1 == line { edit(l) } else { l.to_string() })
            .collect();
        fs::write(path, rewritten.join("\n") + "\n").unwrap();
    }

    fn append_raw(path: &Path, bytes: &str) {
        let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(bytes.as_bytes()).unwrap();
    }

    // ── Hash primitive and canonical form ────────────────────────────────────

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(is_hex_digest(&sha256_hex(b"")));
        assert!(is_hex_digest(GENESIS_HASH));
        assert!(!is_hex_digest("ABC"));
        assert!(!is_hex_digest(&"G".repeat(64)));
    }

    #[test]
    fn test_canonical_layout_is_fixed() {
        let entry = chain::seal(
            action("ARQUITETO", "review PR", 9.0, "approved"),
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            GENESIS_HASH,
        );
        let expected = format!(
            r#"["flightrec/v1","ARQUITETO","review PR",null,9,"approved",null,"2025-03-01T12:00:00.000Z","{}"]"#,
            GENESIS_HASH
        );
        assert_eq!(String::from_utf8(canonical_bytes(&entry)).unwrap(), expected);
        assert_eq!(entry.hash, sha256_hex(expected.as_bytes()));
    }

    #[test]
    fn test_canonical_escapes_strings() {
        let mut entry = chain::seal(
            action("A", "quote \" and\nnewline", 7.5, "r"),
            Utc::now(),
            GENESIS_HASH,
        );
        let canonical = String::from_utf8(canonical_bytes(&entry)).unwrap();
        assert!(canonical.contains(r#""quote \" and\nnewline""#));
        assert!(canonical.contains(",7.5,"));

        // The entry's own hash never feeds its digest.
        let before = entry_digest(&entry);
        entry.hash = "something else".to_string();
        assert_eq!(entry_digest(&entry), before);
    }

    #[test]
    fn test_digest_is_deterministic() {
        let entry = chain::seal(action("A", "b", 3.0, "c"), Utc::now(), GENESIS_HASH);
        assert_eq!(entry_digest(&entry), entry_digest(&entry));
        assert_eq!(entry_digest(&entry), entry.hash);

        // Round-tripping through storage JSON yields the same digest.
        let stored = serde_json::to_string(&entry).unwrap();
        let reparsed: AuditEntry = serde_json::from_str(&stored).unwrap();
        assert_eq!(entry_digest(&reparsed), entry.hash);
    }

    #[test]
    fn test_seal_truncates_timestamp_to_millis() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
            + Duration::nanoseconds(987_654_321);
        let entry = chain::seal(action("A", "b", 1.0, "c"), at, GENESIS_HASH);
        assert_eq!(entry.timestamp.timestamp_subsec_nanos(), 987_000_000);
    }

    // ── Appender ─────────────────────────────────────────────────────────────

    /// The scenario from the governance runbook: two agents, two links.
    #[test]
    fn test_two_agent_scenario() {
        let (_dir, path, appender, _) = setup();
        assert!(!path.exists(), "log must be created lazily");

        let first = appender
            .append(action("ARQUITETO", "review PR", 9.0, "approved"))
            .unwrap();
        assert_eq!(first.prev_hash, GENESIS_HASH);
        assert_eq!(first.prev_hash.len(), 64);
        assert!(is_hex_digest(&first.hash));

        let second = appender
            .append(action("SEGURANCA", "scan", 7.0, "pass"))
            .unwrap();
        assert_eq!(second.prev_hash, first.hash);
        assert!(is_hex_digest(&second.hash));
        assert_ne!(second.hash, first.hash);

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.ends_with('\n'));
    }

    #[test]
    fn test_sequential_appends_verify_ok() {
        let (_dir, path, appender, clock) = setup();
        let entries = append_n(&appender, &clock, 25);

        for pair in entries.windows(2) {
            assert_eq!(pair[1].prev_hash, pair[0].hash);
        }

        let report = verify_file(&path).unwrap();
        assert_eq!(report.valid_count, 25);
        assert_eq!(report.corrupted_count, 0);
        assert_eq!(report.status, ChainStatus::Ok);
        assert_eq!(report.first_corruption_line, None);
        assert!(!report.pending_tail);
    }

    #[test]
    fn test_new_appender_continues_existing_chain() {
        let (_dir, path, appender, clock) = setup();
        let first = append_n(&appender, &clock, 3);
        drop(appender);

        let reopened = FileAppender::new(&path).with_fsync(false);
        let next = reopened.append(action("AGENT", "resume", 6.0, "ok")).unwrap();
        assert_eq!(next.prev_hash, first[2].hash);
        assert!(verify_file(&path).unwrap().is_ok());
    }

    #[test]
    fn test_head_tracks_last_entry() {
        let (_dir, _path, appender, clock) = setup();
        assert_eq!(appender.head().unwrap(), None);

        let entries = append_n(&appender, &clock, 2);
        assert_eq!(appender.head().unwrap(), Some(entries[1].hash.clone()));
    }

    #[test]
    fn test_unterminated_valid_tail_gets_own_line() {
        let (_dir, path, appender, clock) = setup();
        append_n(&appender, &clock, 2);

        let contents = fs::read_to_string(&path).unwrap();
        fs::write(&path, contents.trim_end()).unwrap();

        appender.append(action("AGENT", "after", 5.0, "ok")).unwrap();
        let report = verify_file(&path).unwrap();
        assert_eq!(report.valid_count, 3);
        assert!(report.is_ok());
    }

    #[test]
    fn test_corrupt_tail_refuses_append() {
        let (_dir, path, appender, clock) = setup();
        append_n(&appender, &clock, 2);
        append_raw(&path, "{\"agent\":\"HALF");

        match appender.append(action("AGENT", "next", 5.0, "ok")) {
            Err(FlightError::CorruptTail { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected CorruptTail, got {:?}", other),
        }
        assert!(matches!(
            appender.head(),
            Err(FlightError::CorruptTail { .. })
        ));
    }

    #[test]
    fn test_write_failure_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending.
        let appender = FileAppender::new(dir.path());

        let err = appender
            .append(action("AGENT", "x", 5.0, "ok"))
            .unwrap_err();
        assert!(
            matches!(err, FlightError::AuditWriteFailed { .. }),
            "got {:?}",
            err
        );
    }

    /// A rejected request never reaches the log, and the log stays appendable.
    #[test]
    fn test_rejected_request_leaves_log_appendable() {
        let (_dir, path, appender, _) = setup();
        appender.append(action("A", "first", 5.0, "ok")).unwrap();

        for score in [f64::NAN, f64::INFINITY, -1.0, 10.5] {
            let err = AppendRequest {
                agent: "P0".to_string(),
                intent: "x".to_string(),
                trust_score: score,
                ..AppendRequest::default()
            }
            .validate()
            .unwrap_err();
            assert!(matches!(err, FlightError::Validation { .. }));
        }

        appender.append(action("A", "second", 5.0, "ok")).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("null"), "no non-finite score was stored");
        let report = verify_file(&path).unwrap();
        assert_eq!(report.valid_count, 2);
        assert!(report.is_ok());
    }

    /// Many threads sharing one appender never fork the chain.
    #[test]
    fn test_concurrent_appends_do_not_fork() {
        let (_dir, path, appender, _) = setup();
        let appender = Arc::new(appender);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let appender = Arc::clone(&appender);
                thread::spawn(move || {
                    for i in 0..25 {
                        appender
                            .append(action(&format!("WORKER-{}", t), &format!("job {}", i), 5.0, "ok"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let report = verify_file(&path).unwrap();
        assert_eq!(report.valid_count, 200);
        assert!(report.is_ok(), "{:?}", report.findings);

        let entries = recent(&path, 100).unwrap();
        let mut prevs: Vec<&str> = entries.iter().map(|e| e.prev_hash.as_str()).collect();
        prevs.sort_unstable();
        prevs.dedup();
        assert_eq!(prevs.len(), entries.len(), "no two entries share a predecessor");
    }

    /// Independent appenders on one path (as separate `flightrec append`
    /// processes would be) are serialized by the file lock.
    #[test]
    fn test_independent_appenders_do_not_fork() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("flight_recorder.jsonl");

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let path = path.clone();
                thread::spawn(move || {
                    let appender = FileAppender::new(&path).with_fsync(false);
                    for i in 0..50 {
                        appender
                            .append(action(&format!("PROC-{}", t), &format!("job {}", i), 5.0, "ok"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let report = verify_file(&path).unwrap();
        assert_eq!(report.valid_count, 400);
        assert!(report.is_ok(), "{:?}", report.findings);
        assert_eq!(
            FileAppender::new(&path).head().unwrap(),
            recent(&path, 1).unwrap().first().map(|e| e.hash.clone())
        );
    }

    // ── Verifier ─────────────────────────────────────────────────────────────

    #[test]
    fn test_verify_missing_and_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.jsonl");
        assert_eq!(verify_file(&missing).unwrap(), flightrec_contracts::verify::VerifyReport::empty());

        let empty = dir.path().join("empty.jsonl");
        fs::write(&empty, "").unwrap();
        let report = verify_file(&empty).unwrap();
        assert!(report.is_ok());
        assert_eq!(report.valid_count, 0);
    }

    #[test]
    fn test_verify_is_idempotent() {
        let (_dir, path, appender, clock) = setup();
        append_n(&appender, &clock, 5);
        rewrite_line(&path, 2, |l| l.replace("ok-2", "OK-2"));

        let first = verify_file(&path).unwrap();
        let second = verify_file(&path).unwrap();
        assert_eq!(first, second);
    }

    /// Editing a result without recomputing hashes is detected at that line.
    #[test]
    fn test_tamper_detection() {
        let (_dir, path, appender, clock) = setup();
        let entries = append_n(&appender, &clock, 5);
        rewrite_line(&path, 3, |l| l.replace("ok-3", "oK-3"));

        let report = verify_file(&path).unwrap();
        assert_eq!(report.status, ChainStatus::Corrupted);
        assert!(report.corrupted_count >= 1);
        assert_eq!(report.first_corruption_line, Some(3));

        // Later entries still link to the stored hash and verify on their own.
        assert_eq!(report.corrupted_count, 1);
        assert_eq!(report.valid_count, 4);
        match &report.findings[0].kind {
            FindingKind::HashMismatch { expected, actual } => {
                assert_eq!(actual, &entries[2].hash);
                assert_ne!(expected, actual);
            }
            other => panic!("expected HashMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_reordered_keys_still_verify() {
        let (_dir, path, appender, clock) = setup();
        append_n(&appender, &clock, 3);

        // serde_json::Value re-emits keys in sorted order.
        rewrite_line(&path, 2, |l| {
            let value: serde_json::Value = serde_json::from_str(l).unwrap();
            serde_json::to_string(&value).unwrap()
        });
        let line2 = fs::read_to_string(&path).unwrap().lines().nth(1).unwrap().to_string();
        assert!(line2.starts_with(r#"{"_hash""#));

        assert!(verify_file(&path).unwrap().is_ok());
    }

    #[test]
    fn test_deleted_entry_breaks_linkage() {
        let (_dir, path, appender, clock) = setup();
        let entries = append_n(&appender, &clock, 4);

        let contents = fs::read_to_string(&path).unwrap();
        let kept: Vec<&str> = contents
            .lines()
            .enumerate()
            .filter(|(i, _)| *i != 1)
            .map(|(_, l)| l)
            .collect();
        fs::write(&path, kept.join("\n") + "\n").unwrap();

        let report = verify_file(&path).unwrap();
        assert_eq!(report.corrupted_count, 1);
        assert_eq!(report.first_corruption_line, Some(2));
        assert_eq!(
            report.findings[0].kind,
            FindingKind::PrevHashMismatch {
                expected: entries[0].hash.clone(),
                actual: entries[1].hash.clone(),
            }
        );
    }

    #[test]
    fn test_unparsable_line_is_counted_and_scan_continues() {
        let (_dir, path, appender, clock) = setup();
        append_n(&appender, &clock, 4);
        rewrite_line(&path, 2, |_| "not json at all".to_string());

        let report = verify_file(&path).unwrap();
        assert_eq!(report.corrupted_count, 1);
        assert_eq!(report.valid_count, 3);
        assert_eq!(report.first_corruption_line, Some(2));
        assert!(matches!(
            report.findings[0].kind,
            FindingKind::Unparsable { .. }
        ));
    }

    #[test]
    fn test_forged_genesis_link_is_detected() {
        let (_dir, path, appender, clock) = setup();
        append_n(&appender, &clock, 2);
        rewrite_line(&path, 1, |l| l.replace(GENESIS_HASH, &"1".repeat(64)));

        let report = verify_file(&path).unwrap();
        assert_eq!(report.first_corruption_line, Some(1));
        let kinds: Vec<_> = report.findings.iter().map(|f| &f.kind).collect();
        assert!(kinds
            .iter()
            .any(|k| matches!(k, FindingKind::PrevHashMismatch { .. })));
        assert!(kinds
            .iter()
            .any(|k| matches!(k, FindingKind::HashMismatch { .. })));
        assert_eq!(report.corrupted_count, 1, "one line counts once");
    }

    #[test]
    fn test_partial_trailing_line_is_pending_not_corrupt() {
        let (_dir, path, appender, clock) = setup();
        append_n(&appender, &clock, 3);
        append_raw(&path, "{\"agent\":\"MID-WRI");

        let report = verify_file(&path).unwrap();
        assert!(report.is_ok());
        assert_eq!(report.valid_count, 3);
        assert!(report.pending_tail);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let (_dir, path, appender, clock) = setup();
        append_n(&appender, &clock, 2);
        append_raw(&path, "\n   \n");

        let report = verify_file(&path).unwrap();
        assert!(report.is_ok());
        assert_eq!(report.valid_count, 2);
    }

    // ── In-memory sink ───────────────────────────────────────────────────────

    #[test]
    fn test_in_memory_chain_matches_file_rules() {
        let sink = InMemoryAppender::new();
        assert_eq!(sink.head().unwrap(), None);

        let a = sink.append(action("A", "one", 1.0, "r")).unwrap();
        let b = sink.append(action("B", "two", 2.0, "r")).unwrap();
        assert_eq!(a.prev_hash, GENESIS_HASH);
        assert_eq!(b.prev_hash, a.hash);
        assert_eq!(sink.head().unwrap(), Some(b.hash.clone()));

        let report = sink.verify();
        assert!(report.is_ok());
        assert_eq!(report.valid_count, 2);
    }

    #[test]
    fn test_in_memory_tamper_detection() {
        let sink = InMemoryAppender::new();
        for i in 0..3 {
            sink.append(action("A", &format!("step {}", i), 4.0, "r")).unwrap();
        }

        {
            let mut state = sink.state.lock().unwrap();
            state.entries[1].trust_score = 10.0;
        }

        let report = sink.verify();
        assert_eq!(report.status, ChainStatus::Corrupted);
        assert_eq!(report.first_corruption_line, Some(2));
    }

    // ── Reader ───────────────────────────────────────────────────────────────

    #[test]
    fn test_recent_on_missing_or_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.jsonl");
        assert!(recent(&path, 100).unwrap().is_empty());

        fs::write(&path, "").unwrap();
        assert!(recent(&path, 100).unwrap().is_empty());
    }

    #[test]
    fn test_recent_returns_newest_hundred() {
        let (_dir, path, appender, clock) = setup();
        append_n(&appender, &clock, 150);

        let latest = recent(&path, DEFAULT_RECENT_LIMIT).unwrap();
        assert_eq!(latest.len(), 100);
        assert_eq!(latest[0].intent, "step 150");
        assert_eq!(latest[99].intent, "step 51");
        for pair in latest.windows(2) {
            assert!(pair[0].timestamp > pair[1].timestamp, "strictly newest first");
        }
    }

    #[test]
    fn test_recent_caps_limit() {
        let (_dir, path, appender, clock) = setup();
        append_n(&appender, &clock, 120);

        assert_eq!(recent(&path, 500).unwrap().len(), MAX_RECENT_LIMIT);
        assert_eq!(recent(&path, 7).unwrap().len(), 7);
        assert!(recent(&path, 0).unwrap().is_empty());
    }

    #[test]
    fn test_recent_skips_unparsable_lines() {
        let (_dir, path, appender, clock) = setup();
        append_n(&appender, &clock, 3);
        rewrite_line(&path, 2, |_| "garbage".to_string());
        append_raw(&path, "{\"agent\":\"PARTIAL");

        let latest = recent(&path, 10).unwrap();
        let intents: Vec<&str> = latest.iter().map(|e| e.intent.as_str()).collect();
        assert_eq!(intents, vec!["step 3", "step 1"]);
    }

    #[test]
    fn test_query_filters_by_agent_and_since() {
        let (_dir, path, appender, clock) = setup();
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        for i in 0..6 {
            clock.set(start + Duration::minutes(i));
            let agent = if i % 2 == 0 { "ARQUITETO" } else { "SEGURANCA" };
            appender
                .append(action(agent, &format!("minute {}", i), 8.0, "ok"))
                .unwrap();
        }

        let by_agent = query(
            &path,
            &RecentQuery {
                agent: Some("seguranca".to_string()),
                ..RecentQuery::default()
            },
        )
        .unwrap();
        let intents: Vec<&str> = by_agent.iter().map(|e| e.intent.as_str()).collect();
        assert_eq!(intents, vec!["minute 5", "minute 3", "minute 1"]);

        let since = query(
            &path,
            &RecentQuery {
                since: Some(start + Duration::minutes(4)),
                limit: Some(10),
                ..RecentQuery::default()
            },
        )
        .unwrap();
        assert_eq!(since.len(), 2);
        assert_eq!(since[0].intent, "minute 5");
    }
}
