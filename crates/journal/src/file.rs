use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::memory::JournalLog;
use crate::{
    JournalEntry, JournalError, OrderId, Result, Sequence,
    store::{AppendOptions, EntryStream, Journal},
};

struct FileState {
    log: JournalLog,
    file: File,
    /// Bytes of the file holding acknowledged entries.
    len: u64,
}

/// Journal persisted as JSON lines in a single append-only file.
///
/// The whole file is loaded on [`FileJournal::open`]; afterwards reads are
/// served from memory and every append is written and flushed before it
/// becomes visible.
///
/// An append is acknowledged only once its lines, newline included, are
/// synced. A final line without its newline is the remains of an append that
/// never returned, so `open` cuts it off instead of failing.
#[derive(Clone)]
pub struct FileJournal {
    state: Arc<RwLock<FileState>>,
    path: Arc<PathBuf>,
}

impl FileJournal {
    /// Opens (or creates) the journal file at `path` and replays its contents.
    #[tracing::instrument(skip_all)]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut log = JournalLog::default();
        let mut len = 0;
        for (idx, line) in contents.split_inclusive(|b| *b == b'\n').enumerate() {
            if line.last() != Some(&b'\n') {
                tracing::warn!(
                    path = %path.display(),
                    line = idx + 1,
                    bytes = line.len(),
                    "dropping unterminated journal tail"
                );
                break;
            }
            len += line.len();

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let entry: JournalEntry =
                serde_json::from_slice(line).map_err(|e| JournalError::Corrupt {
                    line: idx + 1,
                    reason: e.to_string(),
                })?;
            let batch = vec![entry];
            log.check(&batch, &AppendOptions::new())
                .map_err(|e| JournalError::Corrupt {
                    line: idx + 1,
                    reason: e.to_string(),
                })?;
            log.extend(batch);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let len = len as u64;
        if len < contents.len() as u64 {
            file.set_len(len).await?;
        }

        tracing::info!(path = %path.display(), entries = log.len(), "journal opened");

        Ok(Self {
            state: Arc::new(RwLock::new(FileState { log, file, len })),
            path: Arc::new(path),
        })
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Journal for FileJournal {
    async fn append(&self, entries: Vec<JournalEntry>, options: AppendOptions) -> Result<Sequence> {
        let mut state = self.state.write().await;
        let position = state.log.check(&entries, &options)?;

        let mut buf = String::new();
        for entry in &entries {
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }
        if let Err(e) = write_synced(&mut state.file, buf.as_bytes()).await {
            // Later appends must not land behind a half-written batch.
            if let Err(rollback) = state.file.set_len(state.len).await {
                tracing::error!(error = %rollback, "failed to cut back partial journal write");
            }
            return Err(e.into());
        }
        state.len += buf.len() as u64;

        state.log.extend(entries);
        metrics::counter!("journal_appends_total").increment(1);
        Ok(position)
    }

    async fn read_stream(&self, stream_id: OrderId) -> Result<Vec<JournalEntry>> {
        Ok(self.state.read().await.log.read(stream_id))
    }

    async fn stream_position(&self, stream_id: OrderId) -> Result<Option<Sequence>> {
        Ok(self.state.read().await.log.stream_position(stream_id))
    }

    async fn stream_ids(&self) -> Result<Vec<OrderId>> {
        Ok(self.state.read().await.log.stream_ids())
    }

    async fn stream_all(&self) -> Result<EntryStream> {
        use futures_util::stream;

        let entries = self.state.read().await.log.all();
        Ok(Box::pin(stream::iter(entries.into_iter().map(Ok))))
    }
}

async fn write_synced(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_data().await
}
