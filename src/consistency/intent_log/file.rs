//! JSON-lines intent log.
//!
//! Every append and update writes the full intent record as one line. On open
//! the file is replayed and the last line per intent wins. A torn final line
//! (crash mid-write) is dropped and the file rewritten; corruption anywhere
//! else is an error.

use super::memory::MemoryIntentLog;
use super::IntentLog;
use crate::consistency::errors::{IntentLogError, IntentLogResult};
use crate::consistency::intent::{IntentRecord, IntentStatus};
use crate::models::{EntityId, IntentId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct FileIntentLog {
    path: PathBuf,
    sync_writes: bool,
    index: MemoryIntentLog,
    writer: Mutex<File>,
}

impl FileIntentLog {
    pub async fn open(path: impl AsRef<Path>, sync_writes: bool) -> IntentLogResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| IntentLogError::io(parent.display(), e))?;
        }

        let index = MemoryIntentLog::new();
        let torn = match fs::read_to_string(&path).await {
            Ok(contents) => Self::replay(&contents, &index)?,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(IntentLogError::io(path.display(), e)),
        };

        if torn {
            warn!(path = %path.display(), "Dropping torn trailing intent log entry");
            Self::rewrite(&path, &index.snapshot(), sync_writes).await?;
        }

        let writer = Self::open_append(&path).await?;
        info!(
            path = %path.display(),
            intents = index.len(),
            pending = index.with_status(IntentStatus::Pending).len(),
            "📒 Intent log opened"
        );

        Ok(Self {
            path,
            sync_writes,
            index,
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the file with one line per intent. Returns the number of lines kept.
    pub async fn compact(&self) -> IntentLogResult<usize> {
        let mut writer = self.writer.lock().await;
        let records = self.index.snapshot();
        Self::rewrite(&self.path, &records, self.sync_writes).await?;
        *writer = Self::open_append(&self.path).await?;
        info!(path = %self.path.display(), intents = records.len(), "Intent log compacted");
        Ok(records.len())
    }

    /// Returns whether a torn trailing line was skipped
    fn replay(contents: &str, index: &MemoryIntentLog) -> IntentLogResult<bool> {
        let lines: Vec<(usize, &str)> = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .collect();
        let last = lines.len().saturating_sub(1);

        for (position, (line_no, line)) in lines.into_iter().enumerate() {
            match serde_json::from_str::<IntentRecord>(line) {
                Ok(record) => index.upsert(record),
                Err(_) if position == last && !contents.ends_with('\n') => return Ok(true),
                Err(e) => {
                    return Err(IntentLogError::Corrupt {
                        line: line_no + 1,
                        reason: e.to_string(),
                    })
                }
            }
        }
        Ok(false)
    }

    async fn rewrite(path: &Path, records: &[IntentRecord], sync: bool) -> IntentLogResult<()> {
        let staging = path.with_extension("compacting");
        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        let mut file = File::create(&staging)
            .await
            .map_err(|e| IntentLogError::io(staging.display(), e))?;
        file.write_all(&buffer)
            .await
            .map_err(|e| IntentLogError::io(staging.display(), e))?;
        if sync {
            file.sync_all()
                .await
                .map_err(|e| IntentLogError::io(staging.display(), e))?;
        }
        drop(file);

        fs::rename(&staging, path)
            .await
            .map_err(|e| IntentLogError::io(path.display(), e))
    }

    async fn open_append(path: &Path) -> IntentLogResult<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| IntentLogError::io(path.display(), e))
    }

    /// Callers hold the writer for the write and the matching index change,
    /// so a concurrent compaction never rewrites the file between the two.
    async fn write_line(&self, writer: &mut File, record: &IntentRecord) -> IntentLogResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        writer
            .write_all(&line)
            .await
            .map_err(|e| IntentLogError::io(self.path.display(), e))?;
        writer
            .flush()
            .await
            .map_err(|e| IntentLogError::io(self.path.display(), e))?;
        if self.sync_writes {
            writer
                .sync_data()
                .await
                .map_err(|e| IntentLogError::io(self.path.display(), e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl IntentLog for FileIntentLog {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn next_sequence(&self) -> IntentLogResult<u64> {
        Ok(self.index.allocate_sequence())
    }

    async fn append(&self, record: &IntentRecord) -> IntentLogResult<()> {
        let mut writer = self.writer.lock().await;
        if self.index.lookup(record.intent_id).is_some() {
            return Err(IntentLogError::Duplicate {
                intent_id: record.intent_id,
            });
        }
        self.write_line(&mut writer, record).await?;
        self.index.insert(record)
    }

    async fn update(&self, record: &IntentRecord) -> IntentLogResult<()> {
        let mut writer = self.writer.lock().await;
        if self.index.lookup(record.intent_id).is_none() {
            return Err(IntentLogError::NotFound(record.intent_id));
        }
        self.write_line(&mut writer, record).await?;
        self.index.replace(record)
    }

    async fn get(&self, intent_id: IntentId) -> IntentLogResult<Option<IntentRecord>> {
        Ok(self.index.lookup(intent_id))
    }

    async fn pending(&self) -> IntentLogResult<Vec<IntentRecord>> {
        Ok(self.index.with_status(IntentStatus::Pending))
    }

    async fn pending_for_entity(&self, entity_id: EntityId) -> IntentLogResult<Vec<IntentRecord>> {
        Ok(self.index.pending_of(entity_id))
    }

    async fn open_for_entity(&self, entity_id: EntityId) -> IntentLogResult<Vec<IntentRecord>> {
        Ok(self.index.open_of(entity_id))
    }

    async fn by_status(&self, status: IntentStatus) -> IntentLogResult<Vec<IntentRecord>> {
        Ok(self.index.with_status(status))
    }

    async fn prune_completed(&self, cutoff: DateTime<Utc>) -> IntentLogResult<usize> {
        let mut writer = self.writer.lock().await;
        let removed = self.index.prune(cutoff);
        if removed > 0 {
            let records = self.index.snapshot();
            Self::rewrite(&self.path, &records, self.sync_writes).await?;
            *writer = Self::open_append(&self.path).await?;
            debug!(path = %self.path.display(), removed, kept = records.len(), "Pruned completed intents");
        }
        Ok(removed)
    }
}
