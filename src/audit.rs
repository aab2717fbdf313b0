//! JSONL audit logging for translation cycles.
//!
//! Every cycle the API serves is logged as a single line in
//! `{app_config_dir}/logs/YYYY-MM-DD.jsonl`. Best-effort: never panics or
//! fails the caller.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CycleAuditEntry<'a> {
    pub ts: String,
    /// `text` or `audio`.
    pub channel: &'a str,
    pub request: &'a str,
    pub actions: usize,
    pub warnings: usize,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    pub duration_ms: u64,
}

/// Outcome of one cycle, as recorded.
pub struct CycleRecord<'a> {
    pub channel: &'a str,
    pub request: &'a str,
    pub result: Result<(usize, usize), &'a str>,
    pub duration: Duration,
}

/// Log a single cycle to today's JSONL audit file.
///
/// This is best-effort: failures are logged at debug level and otherwise
/// ignored so they never affect the caller's control flow.
pub fn log_cycle(app_config_dir: &Path, record: &CycleRecord<'_>) {
    log_cycle_at(app_config_dir, record, Utc::now());
}

fn log_cycle_at(app_config_dir: &Path, record: &CycleRecord<'_>, now: DateTime<Utc>) {
    let (ok, actions, warnings, error) = match record.result {
        Ok((actions, warnings)) => (true, actions, warnings, None),
        Err(e) => (false, 0, 0, Some(e)),
    };

    let entry = CycleAuditEntry {
        ts: now.to_rfc3339(),
        channel: record.channel,
        request: record.request,
        actions,
        warnings,
        ok,
        error,
        duration_ms: u64::try_from(record.duration.as_millis()).unwrap_or(u64::MAX),
    };

    let dir = crate::paths::logs_dir(app_config_dir);
    if let Err(e) = fs::create_dir_all(&dir) {
        tracing::debug!("audit log dir unavailable: {e}");
        return;
    }
    let path = crate::paths::audit_log_path(app_config_dir, &now.format("%Y-%m-%d").to_string());

    if let Ok(json) = serde_json::to_string(&entry) {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{json}");
            }
            Err(e) => tracing::debug!("audit log write failed: {e}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn appends_one_line_per_cycle_in_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2025, 2, 24, 13, 5, 0).unwrap();
        let ok = CycleRecord {
            channel: "text",
            request: "bold the header",
            result: Ok((2, 1)),
            duration: Duration::from_millis(40),
        };
        let failed = CycleRecord {
            channel: "audio",
            request: "<3 bytes of audio/webm>",
            result: Err("Failed to parse AI response: EOF"),
            duration: Duration::from_millis(7),
        };
        log_cycle_at(dir.path(), &ok, now);
        log_cycle_at(dir.path(), &failed, now);

        let path = crate::paths::audit_log_path(dir.path(), "2025-02-24");
        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<serde_json::Value> =
            text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["actions"], 2);
        assert_eq!(lines[0]["warnings"], 1);
        assert!(lines[0].get("error").is_none());
        assert_eq!(lines[1]["ok"], false);
        assert_eq!(lines[1]["channel"], "audio");
    }

    #[test]
    fn unwritable_dir_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        log_cycle(
            &blocker,
            &CycleRecord {
                channel: "text",
                request: "x",
                result: Ok((0, 0)),
                duration: Duration::ZERO,
            },
        );
    }
}
