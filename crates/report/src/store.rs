use crate::lock::{acquire_table_lock, TableFileLock};
use crate::row::{format_lines, ColumnIndex, PersistedBug, RowOutcome, COL_LINES};
use crate::{ReportError, Result};
use bughunt_model::{BugRecord, MemoryAction, MemoryDecision};
use chrono::{SecondsFormat, Utc};
use csv::{ByteRecord, ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Counts of what one `apply` call did to the table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Handle to the bug table on disk
#[derive(Debug, Clone)]
pub struct ReportStore {
    path: PathBuf,
    writer: Arc<Mutex<()>>,
}

impl ReportStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the single-writer lock: process mutex first, then the lock file
    pub async fn lock(&self) -> Result<StoreGuard> {
        let local = Arc::clone(&self.writer).lock_owned().await;
        let file = acquire_table_lock(&self.path).await?;
        Ok(StoreGuard {
            path: self.path.clone(),
            _local: local,
            _file: file,
        })
    }
}

/// Exclusive access to the table for one read-resolve-apply span
pub struct StoreGuard {
    path: PathBuf,
    _local: OwnedMutexGuard<()>,
    _file: TableFileLock,
}

struct Table {
    columns: ColumnIndex,
    rows: Vec<ByteRecord>,
}

impl Table {
    fn empty() -> Self {
        Self {
            columns: ColumnIndex::default_layout(),
            rows: Vec::new(),
        }
    }

    fn parse_rows(&self) -> Vec<RowOutcome> {
        self.rows
            .iter()
            .enumerate()
            .map(|(idx, raw)| parse_row(raw, &self.columns, idx + 1))
            .collect()
    }
}

fn parse_row(raw: &ByteRecord, columns: &ColumnIndex, row: usize) -> RowOutcome {
    let record = match StringRecord::from_byte_record(raw.clone()) {
        Ok(record) => record,
        Err(_) => {
            return RowOutcome::Skipped {
                row,
                reason: "invalid UTF-8".to_string(),
            }
        }
    };
    match PersistedBug::from_record(&record, columns) {
        Ok(bug) => RowOutcome::Parsed(bug),
        Err(reason) => RowOutcome::Skipped { row, reason },
    }
}

async fn read_table(path: &Path) -> Result<Option<Table>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes.as_slice());
    let columns = ColumnIndex::new(reader.headers()?);
    let mut rows = Vec::new();
    for row in reader.byte_records() {
        rows.push(row?);
    }
    Ok(Some(Table { columns, rows }))
}

async fn write_table(path: &Path, table: &Table) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(table.columns.names())?;
    for row in &table.rows {
        writer.write_byte_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ReportError::IoError(err.into_error()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "table".into());
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn with_cell(row: &ByteRecord, position: usize, value: &str, width: usize) -> ByteRecord {
    let len = row.len().max(width).max(position + 1);
    (0..len)
        .map(|idx| {
            if idx == position {
                value.as_bytes()
            } else {
                row.get(idx).unwrap_or_default()
            }
        })
        .collect()
}

impl StoreGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole table. A missing or empty file is an empty snapshot.
    pub async fn snapshot(&self) -> Result<Vec<RowOutcome>> {
        let Some(table) = read_table(&self.path).await? else {
            return Ok(Vec::new());
        };
        Ok(table.parse_rows())
    }

    /// Apply decisions in order and rewrite the table atomically.
    ///
    /// Every decision is validated before anything is written. Rows that do
    /// not parse are carried through untouched.
    pub async fn apply(&self, decisions: &[MemoryDecision]) -> Result<ApplyStats> {
        for decision in decisions {
            decision.record.validate_persistable()?;
        }

        let mut table = read_table(&self.path).await?.unwrap_or_else(Table::empty);
        if let Some(column) = table.columns.missing_required() {
            return Err(ReportError::MissingColumn {
                path: self.path.clone(),
                column,
            });
        }
        let lines_pos = table
            .columns
            .position(COL_LINES)
            .ok_or_else(|| ReportError::MissingColumn {
                path: self.path.clone(),
                column: COL_LINES,
            })?;

        let mut parsed: Vec<Option<PersistedBug>> = table
            .parse_rows()
            .into_iter()
            .map(|outcome| match outcome {
                RowOutcome::Parsed(bug) => Some(bug),
                RowOutcome::Skipped { .. } => None,
            })
            .collect();
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut stats = ApplyStats::default();

        for decision in decisions {
            let existing = parsed
                .iter()
                .position(|bug| bug.as_ref().is_some_and(|b| b.bug_id == decision.bug_id));

            match existing {
                Some(idx) => {
                    let Some(bug) = parsed[idx].as_mut() else {
                        continue;
                    };
                    let merged: BTreeSet<usize> = bug
                        .lines
                        .iter()
                        .chain(decision.merged_lines.iter())
                        .copied()
                        .collect();
                    if merged == bug.lines {
                        log::debug!("{} already covers lines; no change", decision.bug_id);
                        stats.unchanged += 1;
                        continue;
                    }
                    if decision.action == MemoryAction::Create {
                        log::debug!("{} already persisted; merging lines", decision.bug_id);
                    }
                    table.rows[idx] = with_cell(
                        &table.rows[idx],
                        lines_pos,
                        &format_lines(&merged),
                        table.columns.len(),
                    );
                    bug.lines = merged;
                    stats.updated += 1;
                }
                None => {
                    if decision.action == MemoryAction::Update {
                        log::warn!(
                            "UPDATE target {} is no longer in {}; appending",
                            decision.bug_id,
                            self.path.display()
                        );
                    }
                    let bug = PersistedBug::from_bug(
                        &decision.bug_id,
                        &decision.merged_lines,
                        &decision.record,
                        timestamp.clone(),
                    );
                    table
                        .rows
                        .push(ByteRecord::from(bug.to_cells(&table.columns)));
                    parsed.push(Some(bug));
                    stats.created += 1;
                }
            }
        }

        if stats.created + stats.updated > 0 {
            write_table(&self.path, &table).await?;
        }
        log::info!(
            "Applied {} decision(s) to {}: {} created, {} updated, {} unchanged",
            decisions.len(),
            self.path.display(),
            stats.created,
            stats.updated,
            stats.unchanged
        );
        Ok(stats)
    }
}

/// Records the resolver can compare against; skipped rows are logged and dropped
pub fn persisted_records(snapshot: &[RowOutcome]) -> Vec<BugRecord> {
    snapshot
        .iter()
        .filter_map(|outcome| match outcome {
            RowOutcome::Parsed(bug) => Some(bug.to_bug_record()),
            RowOutcome::Skipped { row, reason } => {
                log::warn!("Skipping malformed bug table row {row}: {reason}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::TABLE_COLUMNS;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::TempDir;

    fn decision(action: MemoryAction, id: &str, lines: &[usize]) -> MemoryDecision {
        let mut record = BugRecord::new("API Misuse", "api+iclamp+misuse")
            .language("C++")
            .lines(lines.iter().copied());
        record.id = id.to_string();
        record.explanation = Some("Clamp set too high".to_string());
        MemoryDecision {
            action,
            bug_id: id.to_string(),
            merged_lines: lines.to_vec(),
            record,
        }
    }

    fn store(dir: &TempDir) -> ReportStore {
        ReportStore::new(dir.path().join("output.csv"))
    }

    const SEEDED: &str = "\
bug_id,language,bug_type,lines,bug_signature,explanation,context,source,timestamp
abc123,C++,Mode Configuration Mismatch,\"5,6\",mode configuration mismatch,Mode set late,,knowledge-base,2026-01-01T00:00:00Z
broken,C++,T,not-a-line,sig,,,,
";

    #[tokio::test]
    async fn missing_table_is_empty_snapshot() {
        let dir = TempDir::new().unwrap();
        let guard = store(&dir).lock().await.unwrap();
        assert_eq!(guard.snapshot().await.unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn create_writes_header_and_row() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let guard = store.lock().await.unwrap();

        let stats = guard
            .apply(&[decision(MemoryAction::Create, "1a2b3c4d", &[10, 4])])
            .await
            .unwrap();
        assert_eq!(
            stats,
            ApplyStats {
                created: 1,
                updated: 0,
                unchanged: 0
            }
        );

        let contents = std::fs::read_to_string(store.path()).unwrap();
        assert!(contents.starts_with(&TABLE_COLUMNS.join(",")));
        assert!(contents.contains("1a2b3c4d,C++,API Misuse,\"4,10\",api+iclamp+misuse,Clamp set too high,,knowledge-base,"));

        let snapshot = guard.snapshot().await.unwrap();
        let records = persisted_records(&snapshot);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "1a2b3c4d");
        assert_eq!(records[0].sorted_lines(), vec![4, 10]);
    }

    #[tokio::test]
    async fn update_rewrites_only_lines_and_keeps_bad_rows() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(store.path(), SEEDED).unwrap();
        let guard = store.lock().await.unwrap();

        let snapshot = guard.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[0].parsed().is_some());
        assert!(matches!(snapshot[1], RowOutcome::Skipped { row: 2, .. }));
        assert_eq!(persisted_records(&snapshot).len(), 1);

        let stats = guard
            .apply(&[decision(MemoryAction::Update, "abc123", &[5, 6, 10, 11])])
            .await
            .unwrap();
        assert_eq!(stats.updated, 1);

        let contents = std::fs::read_to_string(store.path()).unwrap();
        assert!(contents.contains(
            "abc123,C++,Mode Configuration Mismatch,\"5,6,10,11\",mode configuration mismatch,Mode set late,,knowledge-base,2026-01-01T00:00:00Z"
        ));
        assert!(contents.contains("broken,C++,T,not-a-line,sig,,,,"));
        assert!(!contents.contains("Clamp set too high"));
    }

    #[tokio::test]
    async fn redundant_update_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(store.path(), SEEDED).unwrap();
        let guard = store.lock().await.unwrap();

        let stats = guard
            .apply(&[decision(MemoryAction::Update, "abc123", &[6])])
            .await
            .unwrap();
        assert_eq!(stats.unchanged, 1);
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), SEEDED);
    }

    #[tokio::test]
    async fn create_for_known_id_merges_instead_of_duplicating() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let guard = store.lock().await.unwrap();

        guard
            .apply(&[decision(MemoryAction::Create, "1a2b3c4d", &[4])])
            .await
            .unwrap();
        let stats = guard
            .apply(&[decision(MemoryAction::Create, "1a2b3c4d", &[9])])
            .await
            .unwrap();
        assert_eq!(stats.updated, 1);

        let records = persisted_records(&guard.snapshot().await.unwrap());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sorted_lines(), vec![4, 9]);
    }

    #[tokio::test]
    async fn invalid_decision_leaves_table_untouched() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(store.path(), SEEDED).unwrap();
        let guard = store.lock().await.unwrap();

        let mut bad = decision(MemoryAction::Create, "ffff0000", &[3]);
        bad.record.signature.clear();
        let result = guard
            .apply(&[decision(MemoryAction::Update, "abc123", &[40]), bad])
            .await;

        assert!(matches!(result, Err(ReportError::Validation(_))));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), SEEDED);
    }

    #[tokio::test]
    async fn table_without_identity_columns_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(store.path(), "id,notes\n1,x\n").unwrap();
        let guard = store.lock().await.unwrap();

        let result = guard
            .apply(&[decision(MemoryAction::Create, "1a2b3c4d", &[1])])
            .await;
        assert!(matches!(
            result,
            Err(ReportError::MissingColumn { column: "bug_id", .. })
        ));
    }

    #[tokio::test]
    async fn second_writer_waits_for_the_first() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let first = store.lock().await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(50), store.lock()).await;
        assert!(blocked.is_err());

        drop(first);
        let second = tokio::time::timeout(Duration::from_secs(5), store.lock()).await;
        assert!(matches!(second, Ok(Ok(_))));
    }
}
