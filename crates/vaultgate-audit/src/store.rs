//! File-backed audit store.
//!
//! One file is `Active` at any instant; rotation seals it and names a
//! successor, cleanup deletes sealed files past the retention horizon. A
//! file's birth time is the timestamp encoded in its name, so age checks
//! never depend on filesystem metadata the platform may not keep.
//!
//! Appends are serialized behind a mutex and each entry is written as a
//! single complete `line + '\n'` call, so concurrent readers never observe
//! a torn line.

use crate::entry::{AuditEntry, Outcome};
use crate::error::AuditError;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use vaultgate_core::constants::{
    AUDIT_DEFAULT_PAGE_SIZE, AUDIT_FILE_EXTENSION, AUDIT_FILE_PREFIX, AUDIT_FILE_TIMESTAMP_FORMAT,
    AUDIT_MAX_PAGE_SIZE,
};

/// Filters and pagination for reading the trail back.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Exact secret identifier match.
    pub secret_id: Option<String>,
    /// Exact outcome match.
    pub outcome: Option<Outcome>,
    /// Inclusive lower bound on entry timestamps.
    pub start_time: Option<DateTime<Utc>>,
    /// Inclusive upper bound on entry timestamps.
    pub end_time: Option<DateTime<Utc>>,
    /// 1-based page number; anything below 1 is clamped up.
    pub page: Option<i64>,
    /// Page size, clamped to `[1, 500]`, default 50.
    pub page_size: Option<i64>,
}

/// One page of query results, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub total_count: usize,
    pub page: u64,
    pub page_size: u64,
    pub has_more: bool,
}

/// Append-only store over a directory of `audit-*.jsonl` files.
pub struct AuditStore {
    dir: PathBuf,
    max_size_bytes: u64,
    max_age: Duration,
    active: Mutex<PathBuf>,
}

impl AuditStore {
    /// Open (or initialize) the store in `dir`.
    ///
    /// If the newest existing audit file is not yet past a rotation
    /// trigger it is reopened as the active file; otherwise a fresh file
    /// name is chosen. The file itself materializes on first write.
    pub fn open(dir: &Path, max_file_size_mb: u64, max_file_age_days: u64) -> Result<Self, AuditError> {
        Self::open_at(
            dir,
            max_file_size_mb.saturating_mul(1024 * 1024),
            Duration::days(max_file_age_days as i64),
            Utc::now(),
        )
    }

    fn open_at(
        dir: &Path,
        max_size_bytes: u64,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, AuditError> {
        fs::create_dir_all(dir)?;
        let newest = Self::audit_files(dir)?.into_iter().next_back();
        let active = match newest {
            Some(path) if !Self::rotation_due(&path, max_size_bytes, max_age, now) => path,
            _ => dir.join(Self::file_name_for(now)),
        };
        tracing::debug!(
            target: "vaultgate_audit",
            file = %active.display(),
            "audit store opened"
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            max_size_bytes,
            max_age,
            active: Mutex::new(active),
        })
    }

    /// Append one entry, rotating first if a trigger has fired.
    pub fn write(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.write_at(entry, Utc::now())
    }

    fn write_at(&self, entry: &AuditEntry, now: DateTime<Utc>) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut active = self
            .active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if active.exists() && Self::rotation_due(&active, self.max_size_bytes, self.max_age, now) {
            let sealed = active.clone();
            *active = self.dir.join(Self::file_name_for(now));
            tracing::debug!(
                target: "vaultgate_audit",
                sealed = %sealed.display(),
                active = %active.display(),
                "rotated audit file"
            );
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&*active)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Read entries back, filtered, newest first, paginated.
    ///
    /// Lines that fail to parse are skipped: the log is best-effort for
    /// historical reads.
    pub fn query(&self, query: &AuditQuery) -> Result<AuditPage, AuditError> {
        let mut matched: Vec<AuditEntry> = Vec::new();
        for path in Self::audit_files(&self.dir)? {
            let content = fs::read_to_string(&path)?;
            for line in content.lines() {
                let Ok(entry) = serde_json::from_str::<AuditEntry>(line) else {
                    continue;
                };
                if let Some(secret_id) = &query.secret_id
                    && entry.secret_id != *secret_id
                {
                    continue;
                }
                if let Some(outcome) = query.outcome
                    && entry.outcome != outcome
                {
                    continue;
                }
                if let Some(start) = query.start_time
                    && entry.timestamp < start
                {
                    continue;
                }
                if let Some(end) = query.end_time
                    && entry.timestamp > end
                {
                    continue;
                }
                matched.push(entry);
            }
        }

        // Input is in write order (files ascend by name, lines by append),
        // so a stable sort keeps completion order among equal timestamps.
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let page = query.page.unwrap_or(1).max(1) as u64;
        let page_size = query
            .page_size
            .unwrap_or(AUDIT_DEFAULT_PAGE_SIZE)
            .clamp(1, AUDIT_MAX_PAGE_SIZE) as u64;
        let total_count = matched.len();
        let offset = ((page - 1) as usize).saturating_mul(page_size as usize);
        let entries: Vec<AuditEntry> = matched
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect();
        let has_more = offset.saturating_add(entries.len()) < total_count;

        Ok(AuditPage {
            entries,
            total_count,
            page,
            page_size,
            has_more,
        })
    }

    /// Delete audit files older than `max_age_ms`, never the active one.
    /// Returns how many were removed.
    pub fn cleanup(&self, max_age_ms: i64) -> Result<usize, AuditError> {
        self.cleanup_at(max_age_ms, Utc::now())
    }

    fn cleanup_at(&self, max_age_ms: i64, now: DateTime<Utc>) -> Result<usize, AuditError> {
        let active = self
            .active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        let horizon = now - Duration::milliseconds(max_age_ms);
        let mut removed = 0;
        for path in Self::audit_files(&self.dir)? {
            if path == active {
                continue;
            }
            let Some(birth) = Self::file_timestamp(&path) else {
                continue;
            };
            if birth < horizon {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(target: "vaultgate_audit", removed, "cleaned up expired audit files");
        }
        Ok(removed)
    }

    /// Path of the file currently receiving writes.
    pub fn active_file(&self) -> PathBuf {
        self.active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn file_name_for(now: DateTime<Utc>) -> String {
        format!(
            "{AUDIT_FILE_PREFIX}{}{AUDIT_FILE_EXTENSION}",
            now.format(AUDIT_FILE_TIMESTAMP_FORMAT)
        )
    }

    /// Birth instant encoded in an audit file's name.
    fn file_timestamp(path: &Path) -> Option<DateTime<Utc>> {
        let name = path.file_name()?.to_str()?;
        let stamp = name
            .strip_prefix(AUDIT_FILE_PREFIX)?
            .strip_suffix(AUDIT_FILE_EXTENSION)?;
        NaiveDateTime::parse_from_str(stamp, AUDIT_FILE_TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }

    fn rotation_due(
        path: &Path,
        max_size_bytes: u64,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        let size_due = fs::metadata(path).map(|m| m.len() >= max_size_bytes).unwrap_or(false);
        let age_due = Self::file_timestamp(path).is_some_and(|birth| now - birth >= max_age);
        size_due || age_due
    }

    /// All audit files in the directory, sorted ascending by name (which is
    /// ascending by birth time, given the fixed timestamp layout).
    fn audit_files(dir: &Path) -> Result<Vec<PathBuf>, AuditError> {
        let mut files: Vec<PathBuf> = Vec::new();
        for dir_entry in fs::read_dir(dir)? {
            let path = dir_entry?.path();
            if path.is_file() && Self::file_timestamp(&path).is_some() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn instant(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, secs).unwrap()
    }

    fn store_at(dir: &Path, now: DateTime<Utc>) -> AuditStore {
        AuditStore::open_at(dir, 10 * 1024 * 1024, Duration::days(7), now).unwrap()
    }

    fn entry(secret_id: &str, outcome: Outcome, at: DateTime<Utc>) -> AuditEntry {
        let mut e = AuditEntry::new(secret_id, "http_get", outcome, "completed");
        e.timestamp = at;
        e
    }

    #[test]
    fn test_write_then_query_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_at(dir.path(), instant(0));
        let written = entry("gh", Outcome::Success, instant(1))
            .with_domain("api.github.com")
            .with_method("GET");
        store.write_at(&written, instant(1)).unwrap();

        let page = store.query(&AuditQuery::default()).unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.entries[0], written);

        // The on-disk line is a single compact JSON object plus newline.
        let raw = fs::read_to_string(store.active_file()).unwrap();
        assert!(raw.ends_with('\n'));
        assert_eq!(raw.lines().count(), 1);
    }

    #[test]
    fn test_exactly_one_active_file() {
        let dir = TempDir::new().unwrap();
        let store = store_at(dir.path(), instant(0));
        for i in 0..5 {
            store
                .write_at(&entry("gh", Outcome::Success, instant(i)), instant(i))
                .unwrap();
        }
        let files = AuditStore::audit_files(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0], store.active_file());
    }

    #[test]
    fn test_startup_reopens_fresh_file() {
        let dir = TempDir::new().unwrap();
        let first = store_at(dir.path(), instant(0));
        first
            .write_at(&entry("gh", Outcome::Success, instant(0)), instant(0))
            .unwrap();
        let active = first.active_file();
        drop(first);

        let second = store_at(dir.path(), instant(30));
        assert_eq!(second.active_file(), active);
    }

    #[test]
    fn test_startup_rotates_stale_file() {
        let dir = TempDir::new().unwrap();
        let first = store_at(dir.path(), instant(0));
        first
            .write_at(&entry("gh", Outcome::Success, instant(0)), instant(0))
            .unwrap();
        let old_active = first.active_file();
        drop(first);

        // Eight days later the old file is past the age trigger.
        let later = instant(0) + Duration::days(8);
        let second = AuditStore::open_at(dir.path(), 10 * 1024 * 1024, Duration::days(7), later)
            .unwrap();
        assert_ne!(second.active_file(), old_active);
    }

    #[test]
    fn test_size_rotation_seals_previous_file() {
        let dir = TempDir::new().unwrap();
        // Tiny threshold: every line trips the size trigger for the next.
        let store = AuditStore::open_at(dir.path(), 64, Duration::days(7), instant(0)).unwrap();
        store
            .write_at(&entry("gh", Outcome::Success, instant(0)), instant(0))
            .unwrap();
        store
            .write_at(&entry("gh", Outcome::Success, instant(1)), instant(1))
            .unwrap();

        let files = AuditStore::audit_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2, "second write should land in a fresh file");

        // Both files remain readable through query.
        let page = store.query(&AuditQuery::default()).unwrap();
        assert_eq!(page.total_count, 2);
    }

    #[test]
    fn test_age_rotation_before_append() {
        let dir = TempDir::new().unwrap();
        let store =
            AuditStore::open_at(dir.path(), 10 * 1024 * 1024, Duration::days(7), instant(0))
                .unwrap();
        store
            .write_at(&entry("gh", Outcome::Success, instant(0)), instant(0))
            .unwrap();
        let later = instant(0) + Duration::days(7);
        store
            .write_at(&entry("gh", Outcome::Success, later), later)
            .unwrap();
        assert_eq!(AuditStore::audit_files(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_query_filters() {
        let dir = TempDir::new().unwrap();
        let store = store_at(dir.path(), instant(0));
        store.write_at(&entry("gh", Outcome::Success, instant(1)), instant(1)).unwrap();
        store.write_at(&entry("gh", Outcome::Denied, instant(2)), instant(2)).unwrap();
        store.write_at(&entry("aws", Outcome::Success, instant(3)), instant(3)).unwrap();

        let by_secret = store
            .query(&AuditQuery {
                secret_id: Some("gh".to_string()),
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(by_secret.total_count, 2);

        let by_outcome = store
            .query(&AuditQuery {
                outcome: Some(Outcome::Denied),
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(by_outcome.total_count, 1);
        assert_eq!(by_outcome.entries[0].secret_id, "gh");

        let by_range = store
            .query(&AuditQuery {
                start_time: Some(instant(2)),
                end_time: Some(instant(3)),
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(by_range.total_count, 2);
    }

    #[test]
    fn test_query_sorts_newest_first_stable_on_ties() {
        let dir = TempDir::new().unwrap();
        let store = store_at(dir.path(), instant(0));
        let tie = instant(5);
        store.write_at(&entry("first", Outcome::Success, tie), tie).unwrap();
        store.write_at(&entry("second", Outcome::Success, tie), tie).unwrap();
        store.write_at(&entry("newest", Outcome::Success, instant(9)), instant(9)).unwrap();

        let page = store.query(&AuditQuery::default()).unwrap();
        let ids: Vec<&str> = page.entries.iter().map(|e| e.secret_id.as_str()).collect();
        assert_eq!(ids, vec!["newest", "first", "second"]);
    }

    #[test]
    fn test_pagination_and_clamping() {
        let dir = TempDir::new().unwrap();
        let store = store_at(dir.path(), instant(0));
        for i in 0..7 {
            store.write_at(&entry("gh", Outcome::Success, instant(i)), instant(i)).unwrap();
        }

        let page1 = store
            .query(&AuditQuery {
                page: Some(1),
                page_size: Some(3),
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(page1.entries.len(), 3);
        assert_eq!(page1.total_count, 7);
        assert!(page1.has_more);

        let page3 = store
            .query(&AuditQuery {
                page: Some(3),
                page_size: Some(3),
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(page3.entries.len(), 1);
        assert!(!page3.has_more);

        // pageSize 0 or negative clamps to 1; oversized clamps to 500;
        // page below 1 clamps to 1.
        let clamped = store
            .query(&AuditQuery {
                page: Some(-2),
                page_size: Some(0),
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(clamped.page, 1);
        assert_eq!(clamped.page_size, 1);
        assert_eq!(clamped.entries.len(), 1);

        let oversized = store
            .query(&AuditQuery {
                page_size: Some(9999),
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(oversized.page_size, 500);

        let defaulted = store.query(&AuditQuery::default()).unwrap();
        assert_eq!(defaulted.page_size, 50);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let store = store_at(dir.path(), instant(0));
        store.write_at(&entry("gh", Outcome::Success, instant(1)), instant(1)).unwrap();
        let mut file = OpenOptions::new()
            .append(true)
            .open(store.active_file())
            .unwrap();
        file.write_all(b"this is not json\n{\"half\":\n").unwrap();
        store.write_at(&entry("gh", Outcome::Denied, instant(2)), instant(2)).unwrap();

        let page = store.query(&AuditQuery::default()).unwrap();
        assert_eq!(page.total_count, 2);
    }

    #[test]
    fn test_cleanup_spares_active_file() {
        let dir = TempDir::new().unwrap();
        let store = AuditStore::open_at(dir.path(), 64, Duration::days(7), instant(0)).unwrap();
        // Force several sealed files via the tiny size threshold.
        for i in 0..3 {
            store.write_at(&entry("gh", Outcome::Success, instant(i)), instant(i)).unwrap();
        }
        assert_eq!(AuditStore::audit_files(dir.path()).unwrap().len(), 3);

        // Everything older than 1 second at t=10 is expired except the
        // active file.
        let removed = store.cleanup_at(1_000, instant(10)).unwrap();
        assert_eq!(removed, 2);
        let files = AuditStore::audit_files(dir.path()).unwrap();
        assert_eq!(files, vec![store.active_file()]);
    }
}
