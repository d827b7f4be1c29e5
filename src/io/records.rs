use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::row::RowFields;
use crate::remote::source::{RawItem, RemoteError, RemoteId, RemoteOp, RemoteSource};

/// One record in a panel's JSON store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub title: String,
    /// Ordering partition: a state name, or a period start date for the
    /// review panel.
    #[serde(default)]
    pub group: String,
    pub order: f64,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub abandoned: bool,
    #[serde(default)]
    pub due_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub due_time: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

impl StoredRecord {
    fn to_raw(&self) -> RawItem {
        RawItem {
            remote_id: self.id.clone(),
            group: self.group.clone(),
            order: self.order,
            fields: RowFields {
                title: self.title.clone(),
                status: self.group.clone(),
                due_date: self.due_date,
                due_time: self.due_time.clone(),
                assignee: self.assignee.clone(),
                url: self.url.clone(),
                note: self.note.clone(),
                done: self.done,
                abandoned: self.abandoned,
            },
        }
    }
}

/// A panel source backed by a local JSON file.
///
/// Every call reads and rewrites the file, so external edits are picked up
/// on the next refresh. Writes go through a temp file and an atomic rename.
pub struct RecordStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles across worker threads.
    lock: Mutex<()>,
    /// Error to return from the next call; test hook for failure paths.
    fail_next: Mutex<Option<RemoteError>>,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RecordStore {
            path: path.into(),
            lock: Mutex::new(()),
            fail_next: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make the next remote call fail with `err`.
    pub fn fail_next(&self, err: RemoteError) {
        *self.fail_next.lock().expect("fail_next lock") = Some(err);
    }

    fn take_injected_failure(&self) -> Option<RemoteError> {
        self.fail_next.lock().expect("fail_next lock").take()
    }

    /// Load all records. A missing file is an empty store; a malformed one
    /// is an error (the remote is the system of record, never clobber it).
    pub fn load(&self) -> Result<Vec<StoredRecord>, RemoteError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| RemoteError::Unavailable(format!("{}: {}", self.path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(RemoteError::Unavailable(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    pub fn save(&self, records: &[StoredRecord]) -> Result<(), RemoteError> {
        let io_err =
            |e: String| RemoteError::Unavailable(format!("{}: {}", self.path.display(), e));
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(records).map_err(|e| io_err(e.to_string()))?;
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| io_err(e.to_string()))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| io_err(e.to_string()))?;
        tmp.persist(&self.path).map_err(|e| io_err(e.to_string()))?;
        Ok(())
    }

    fn next_id(records: &[StoredRecord]) -> String {
        let max = records
            .iter()
            .filter_map(|r| r.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        (max + 1).to_string()
    }
}

impl RemoteSource for RecordStore {
    fn fetch_all(&self) -> Result<Vec<RawItem>, RemoteError> {
        if let Some(err) = self.take_injected_failure() {
            return Err(err);
        }
        let _guard = self.lock.lock().expect("store lock");
        Ok(self.load()?.iter().map(StoredRecord::to_raw).collect())
    }

    fn create(&self, fields: &RowFields, group: &str, order: f64) -> Result<RemoteId, RemoteError> {
        if let Some(err) = self.take_injected_failure() {
            return Err(err);
        }
        if fields.title.trim().is_empty() {
            return Err(RemoteError::Rejected("empty title".into()));
        }
        let _guard = self.lock.lock().expect("store lock");
        let mut records = self.load()?;
        let id = Self::next_id(&records);
        records.push(StoredRecord {
            id: id.clone(),
            title: fields.title.clone(),
            group: group.to_string(),
            order,
            done: fields.done,
            abandoned: fields.abandoned,
            due_date: fields.due_date,
            due_time: fields.due_time.clone(),
            assignee: fields.assignee.clone(),
            url: fields.url.clone(),
            note: fields.note.clone(),
            created_at: Utc::now(),
        });
        self.save(&records)?;
        Ok(id)
    }

    fn mutate(&self, id: &RemoteId, op: &RemoteOp) -> Result<(), RemoteError> {
        if let Some(err) = self.take_injected_failure() {
            return Err(err);
        }
        let _guard = self.lock.lock().expect("store lock");
        let mut records = self.load()?;

        if matches!(op, RemoteOp::Delete) {
            let before = records.len();
            records.retain(|r| &r.id != id);
            if records.len() == before {
                return Err(RemoteError::Rejected(format!("unknown id: {}", id)));
            }
            return self.save(&records);
        }

        let record = records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| RemoteError::Rejected(format!("unknown id: {}", id)))?;
        match op {
            RemoteOp::Complete => record.done = true,
            RemoteOp::Reopen => record.done = false,
            RemoteOp::SetDue { date } => record.due_date = *date,
            RemoteOp::SetState { state } => record.group = state.clone(),
            RemoteOp::Assign { assignee } => record.assignee = assignee.clone(),
            RemoteOp::SetOrder { order } => record.order = *order,
            RemoteOp::Abandon => record.abandoned = true,
            RemoteOp::Restore => record.abandoned = false,
            RemoteOp::Delete => unreachable!("handled above"),
        }
        self.save(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> RecordStore {
        RecordStore::new(dir.path().join("rows.json"))
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        assert!(s.fetch_all().unwrap().is_empty());
    }

    #[test]
    fn malformed_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        fs::write(s.path(), "not json {{{").unwrap();
        assert!(matches!(s.fetch_all(), Err(RemoteError::Unavailable(_))));
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let a = s.create(&RowFields::titled("one"), "todo", 1.0).unwrap();
        let b = s.create(&RowFields::titled("two"), "todo", 2.0).unwrap();
        assert_eq!(a, "1");
        assert_eq!(b, "2");
        let items = s.fetch_all().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].fields.title, "two");
    }

    #[test]
    fn create_empty_title_is_rejected() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        assert!(matches!(
            s.create(&RowFields::titled("  "), "todo", 1.0),
            Err(RemoteError::Rejected(_))
        ));
    }

    #[test]
    fn mutations_round_trip() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let id = s.create(&RowFields::titled("task"), "todo", 1.0).unwrap();

        s.mutate(&id, &RemoteOp::Complete).unwrap();
        assert!(s.fetch_all().unwrap()[0].fields.done);

        s.mutate(&id, &RemoteOp::Reopen).unwrap();
        assert!(!s.fetch_all().unwrap()[0].fields.done);

        s.mutate(
            &id,
            &RemoteOp::SetState {
                state: "progress".into(),
            },
        )
        .unwrap();
        assert_eq!(s.fetch_all().unwrap()[0].group, "progress");

        s.mutate(&id, &RemoteOp::SetOrder { order: 9.5 }).unwrap();
        assert_eq!(s.fetch_all().unwrap()[0].order, 9.5);
    }

    #[test]
    fn delete_removes_record() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let id = s.create(&RowFields::titled("task"), "todo", 1.0).unwrap();
        s.mutate(&id, &RemoteOp::Delete).unwrap();
        assert!(s.fetch_all().unwrap().is_empty());
    }

    #[test]
    fn unknown_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        assert!(matches!(
            s.mutate(&"42".to_string(), &RemoteOp::Complete),
            Err(RemoteError::Rejected(_))
        ));
        assert!(matches!(
            s.mutate(&"42".to_string(), &RemoteOp::Delete),
            Err(RemoteError::Rejected(_))
        ));
    }

    #[test]
    fn injected_failure_fires_once() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.fail_next(RemoteError::Unavailable("socket timeout".into()));
        assert!(matches!(s.fetch_all(), Err(RemoteError::Unavailable(_))));
        assert!(s.fetch_all().is_ok());
    }
}
