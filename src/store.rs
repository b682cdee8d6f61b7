// src/store.rs
//! Durable set of processed article ids.
//!
//! On disk this is a plain text file, one id per `\n`-terminated line, only
//! ever appended to. A line without its terminating newline is a torn write
//! and is not part of the set.

use std::collections::HashSet;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use metrics::counter;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::{PipelineError, Result};

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Missing or empty store yields an empty set.
    async fn load(&self) -> Result<HashSet<String>>;

    /// Returns only after the id is durable.
    async fn append(&self, id: &str) -> Result<()>;
}

pub struct FileStateStore {
    path: PathBuf,
    // serializes appends; callers need no extra locking
    write_lock: Mutex<()>,
}

impl FileStateStore {
    /// Open the store, cutting off a torn trailing record left by a crash.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        repair_torn_tail(&path).await?;
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<HashSet<String>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "no processed-articles file, starting fresh");
                return Ok(HashSet::new());
            }
            Err(e) => return Err(e.into()),
        };
        let ids = parse_records(&content);
        tracing::info!(path = %self.path.display(), count = ids.len(), "loaded processed articles");
        Ok(ids)
    }

    async fn append(&self, id: &str) -> Result<()> {
        if id.is_empty() || id.contains(['\n', '\r']) {
            return Err(PipelineError::Persistence(std::io::Error::new(
                ErrorKind::InvalidInput,
                "article id must be a non-empty single line",
            )));
        }

        let _guard = self.write_lock.lock().await;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut len_before = file.metadata().await?.len();

        // a failed rollback can leave a fragment; never write onto it
        if len_before > 0 && !ends_with_newline(&mut file, len_before).await? {
            repair_torn_tail(&self.path).await?;
            len_before = file.metadata().await?.len();
        }

        let record = format!("{id}\n");
        let written = async {
            file.write_all(record.as_bytes()).await?;
            file.sync_data().await
        }
        .await;

        if let Err(e) = written {
            counter!("store_append_failures_total").increment(1);
            // roll back to the pre-append state; load() ignores a torn tail anyway
            if let Err(trunc) = file.set_len(len_before).await {
                tracing::error!(error = %trunc, "could not roll back partial append");
            }
            return Err(e.into());
        }
        Ok(())
    }
}

/// Every complete line is an id; blank lines and duplicates collapse.
fn parse_records(content: &str) -> HashSet<String> {
    let complete = match content.rfind('\n') {
        Some(idx) => &content[..idx],
        None => "",
    };
    complete
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

async fn ends_with_newline(file: &mut fs::File, len: u64) -> Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1)).await?;
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

async fn repair_torn_tail(path: &Path) -> Result<()> {
    let bytes = match fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if bytes.is_empty() || bytes.last() == Some(&b'\n') {
        return Ok(());
    }
    let keep = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    tracing::warn!(
        path = %path.display(),
        dropped_bytes = bytes.len() - keep,
        "truncating torn record at end of state file"
    );
    let file = OpenOptions::new().write(true).open(path).await?;
    file.set_len(keep as u64).await?;
    file.sync_all().await?;
    Ok(())
}
