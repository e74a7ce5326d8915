use crate::domain::errors::LedgerStoreError;
use crate::ports::outbound::LedgerStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{Block, DeviceId};
use std::collections::HashMap;
use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader, SeekFrom, Take};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// File-backed ledger: one JSON block per line, appended and synced.
///
/// Only the tail block and a per-location index of line offsets stay in
/// memory. Range reads seek to the indexed lines; full reads stream the
/// file. A torn final line left by a crash mid-append is truncated on
/// open; a damaged line anywhere else is reported as corruption.
pub struct JsonLinesLedgerStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

struct Inner {
    file: File,
    /// Length of the file up to the last complete line.
    len: u64,
    /// Physical lines up to `len`, blank ones included.
    lines: usize,
    count: u64,
    tail: Option<Block>,
    by_location: HashMap<DeviceId, Vec<LineRef>>,
}

/// Where one block lives in the file.
#[derive(Debug, Clone, Copy)]
struct LineRef {
    offset: u64,
    len: usize,
    line: usize,
    timestamp: DateTime<Utc>,
}

impl Inner {
    fn index(&mut self, block: Block, offset: u64, len: usize, line: usize) {
        self.by_location
            .entry(block.location.clone())
            .or_default()
            .push(LineRef {
                offset,
                len,
                line,
                timestamp: block.timestamp,
            });
        self.count += 1;
        self.lines = line;
        self.tail = Some(block);
    }
}

impl JsonLinesLedgerStore {
    /// Open (or create) the ledger file at `path`.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerStoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let file_len = file.metadata().await?.len();

        let mut inner = Inner {
            file,
            len: 0,
            lines: 0,
            count: 0,
            tail: None,
            by_location: HashMap::new(),
        };

        let mut lines = LineReader::open(&path, file_len).await?;
        while let Some(raw) = lines.next().await? {
            if raw.bytes.iter().all(u8::is_ascii_whitespace) {
                if !raw.terminated {
                    break;
                }
                inner.len = raw.end();
                inner.lines = raw.number;
                continue;
            }

            match serde_json::from_slice::<Block>(raw.bytes) {
                Ok(block) if raw.terminated => {
                    let (offset, len, line, end) = (raw.offset, raw.bytes.len(), raw.number, raw.end());
                    inner.index(block, offset, len, line);
                    inner.len = end;
                }
                // Unterminated final line: the append never completed
                Ok(_) => break,
                Err(_) if !raw.terminated => break,
                Err(e) => {
                    return Err(LedgerStoreError::Corrupt {
                        line: raw.number,
                        message: e.to_string(),
                    })
                }
            }
        }

        if inner.len < file_len {
            warn!(
                path = %path.display(),
                dropped_bytes = file_len - inner.len,
                "Truncating torn final ledger entry"
            );
            inner.file.set_len(inner.len).await?;
            inner.file.sync_all().await?;
        }

        info!(path = %path.display(), blocks = inner.count, "Ledger file opened");

        Ok(Self {
            path,
            inner: Mutex::new(inner),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Sequential reader over the first `limit` bytes of a ledger file.
struct LineReader {
    reader: BufReader<Take<File>>,
    offset: u64,
    number: usize,
    buf: Vec<u8>,
}

/// One line as read, without its newline.
struct RawLine<'a> {
    offset: u64,
    number: usize,
    bytes: &'a [u8],
    terminated: bool,
}

impl RawLine<'_> {
    /// Offset just past this line and its newline.
    fn end(&self) -> u64 {
        self.offset + self.bytes.len() as u64 + u64::from(self.terminated)
    }
}

impl LineReader {
    async fn open(path: &Path, limit: u64) -> io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self {
            reader: BufReader::new(file.take(limit)),
            offset: 0,
            number: 0,
            buf: Vec::new(),
        })
    }

    async fn next(&mut self) -> io::Result<Option<RawLine<'_>>> {
        self.offset += self.buf.len() as u64;
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }
        self.number += 1;

        let terminated = self.buf.last() == Some(&b'\n');
        let content = if terminated {
            &self.buf[..self.buf.len() - 1]
        } else {
            &self.buf[..]
        };
        Ok(Some(RawLine {
            offset: self.offset,
            number: self.number,
            bytes: content,
            terminated,
        }))
    }
}

fn parse_line(bytes: &[u8], line: usize) -> Result<Block, LedgerStoreError> {
    serde_json::from_slice(bytes).map_err(|e| LedgerStoreError::Corrupt {
        line,
        message: e.to_string(),
    })
}

#[async_trait]
impl LedgerStore for JsonLinesLedgerStore {
    async fn fetch_tail(&self) -> Result<Option<Block>, LedgerStoreError> {
        Ok(self.inner.lock().await.tail.clone())
    }

    async fn append(&self, block: &Block) -> Result<(), LedgerStoreError> {
        let mut inner = self.inner.lock().await;

        let expected = inner.count;
        if block.index != expected {
            return Err(LedgerStoreError::IndexConflict {
                expected,
                got: block.index,
            });
        }

        let mut line = serde_json::to_vec(block).map_err(|e| LedgerStoreError::Io {
            message: e.to_string(),
        })?;
        line.push(b'\n');

        let write = async {
            inner.file.write_all(&line).await?;
            inner.file.sync_data().await
        }
        .await;

        if let Err(e) = write {
            // Drop whatever part of the line made it to disk
            let len = inner.len;
            if let Err(rollback) = inner.file.set_len(len).await {
                warn!(error = %rollback, "Failed to roll back partial ledger write");
            }
            return Err(e.into());
        }

        let offset = inner.len;
        let number = inner.lines + 1;
        inner.len += line.len() as u64;
        inner.index(block.clone(), offset, line.len() - 1, number);
        debug!(index = block.index, bytes = line.len(), "Block appended to ledger file");
        Ok(())
    }

    async fn range_by_location(
        &self,
        location: &DeviceId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Block>, LedgerStoreError> {
        let inner = self.inner.lock().await;
        let mut refs: Vec<LineRef> = inner
            .by_location
            .get(location)
            .map(|refs| {
                refs.iter()
                    .filter(|r| from.map_or(true, |f| r.timestamp >= f))
                    .filter(|r| to.map_or(true, |t| r.timestamp <= t))
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        if refs.is_empty() {
            return Ok(Vec::new());
        }
        // Lines are in index order, so a stable sort keeps index as the tie-break
        refs.sort_by_key(|r| r.timestamp);

        let mut file = File::open(&self.path).await?;
        let mut buf = Vec::new();
        let mut blocks = Vec::with_capacity(refs.len());
        for r in refs {
            buf.resize(r.len, 0);
            file.seek(SeekFrom::Start(r.offset)).await?;
            file.read_exact(&mut buf).await?;
            blocks.push(parse_line(&buf, r.line)?);
        }
        Ok(blocks)
    }

    async fn all(&self) -> Result<Vec<Block>, LedgerStoreError> {
        let mut blocks = Vec::new();
        self.scan(&mut |block| {
            blocks.push(block.clone());
            ControlFlow::Continue(())
        })
        .await?;
        Ok(blocks)
    }

    async fn scan(
        &self,
        visit: &mut (dyn for<'b> FnMut(&'b Block) -> ControlFlow<()> + Send),
    ) -> Result<(), LedgerStoreError> {
        // Held for the whole walk so no append lands mid-scan
        let inner = self.inner.lock().await;
        let mut lines = LineReader::open(&self.path, inner.len).await?;
        while let Some(raw) = lines.next().await? {
            if raw.bytes.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let block = parse_line(raw.bytes, raw.number)?;
            if visit(&block).is_break() {
                break;
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64, LedgerStoreError> {
        Ok(self.inner.lock().await.count)
    }
}
