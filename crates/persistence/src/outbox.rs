//! JSONL notification outbox - append-only writer
//!
//! Records are written to one file per day: `data/outbox/2026-10-16.jsonl`.
//! A delivery worker outside this crate can tail the files.

use crate::error::{PersistenceError, PersistenceResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// One queued notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// NTF_000001 style, monotonically increasing across files
    pub id: String,
    pub user_id: String,
    pub event: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Append-only outbox over daily JSONL files
pub struct OutboxStore {
    base_path: PathBuf,
    counter: AtomicU64,
    current_writer: Mutex<Option<DailyWriter>>,
}

struct DailyWriter {
    date: String,
    writer: BufWriter<File>,
}

impl OutboxStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> PersistenceResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        let counter = Self::load_counter(&base_path)?;

        Ok(Self {
            base_path,
            counter: AtomicU64::new(counter),
            current_writer: Mutex::new(None),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resume numbering after the highest ID already on disk.
    fn load_counter(base_path: &Path) -> PersistenceResult<u64> {
        let mut max_id: u64 = 0;
        for record in Self::read_dir(base_path)? {
            if let Some(num) = record
                .id
                .strip_prefix("NTF_")
                .and_then(|n| n.parse::<u64>().ok())
            {
                max_id = max_id.max(num);
            }
        }
        Ok(max_id + 1)
    }

    fn next_id(&self) -> String {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("NTF_{:06}", id)
    }

    /// Queue a notification and return the stored record.
    pub fn append(
        &self,
        user_id: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> PersistenceResult<OutboxRecord> {
        let now = Utc::now();
        let record = OutboxRecord {
            id: self.next_id(),
            user_id: user_id.to_string(),
            event: event.to_string(),
            payload,
            created_at: now,
        };
        let date = now.format("%Y-%m-%d").to_string();
        let json = serde_json::to_string(&record)?;

        let mut guard = self
            .current_writer
            .lock()
            .map_err(|_| PersistenceError::Other("outbox writer lock poisoned".to_string()))?;

        if guard.as_ref().map_or(true, |w| w.date != date) {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.base_path.join(format!("{}.jsonl", date)))?;
            *guard = Some(DailyWriter {
                date,
                writer: BufWriter::new(file),
            });
        }

        if let Some(ref mut w) = *guard {
            writeln!(w.writer, "{}", json)?;
            w.writer.flush()?;
        }

        Ok(record)
    }

    /// All records on disk, oldest file first.
    pub fn read_all(&self) -> PersistenceResult<Vec<OutboxRecord>> {
        Self::read_dir(&self.base_path)
    }

    fn read_dir(base_path: &Path) -> PersistenceResult<Vec<OutboxRecord>> {
        let mut files: Vec<PathBuf> = fs::read_dir(base_path)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().map_or(false, |ext| ext == "jsonl"))
            .collect();
        files.sort();

        let mut records = Vec::new();
        for path in files {
            let reader = BufReader::new(File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<OutboxRecord>(&line) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        tracing::warn!(file = %path.display(), error = %e, "Skipping malformed outbox line")
                    }
                }
            }
        }
        Ok(records)
    }
}
