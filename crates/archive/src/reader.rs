//! Newline-delimited JSON block archive.
//!
//! One [`RawBlock`] per line, in increasing height order. Blank lines and
//! lines starting with `#` are ignored.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, instrument, trace};

use tally_core::error::{ChainError, ChainResult};
use tally_core::ports::{BlockSource, BlockStream, RawBlock, SourceHead};

/// Block source reading an NDJSON archive from disk.
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    path: PathBuf,
}

impl ArchiveSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Check the archive can be opened.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> ChainResult<Self> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| ChainError::ConnectionFailed(format!("{}: {e}", path.display())))?;
        if !meta.is_file() {
            return Err(ChainError::ConnectionFailed(format!(
                "{} is not a file",
                path.display()
            )));
        }
        debug!(bytes = meta.len(), "Archive opened");
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn lines(&self) -> ChainResult<Lines<BufReader<File>>> {
        let file = File::open(&self.path)
            .await
            .map_err(|e| ChainError::ConnectionFailed(format!("{}: {e}", self.path.display())))?;
        Ok(BufReader::new(file).lines())
    }
}

/// Line reader state carried through the stream.
struct Cursor {
    lines: Lines<BufReader<File>>,
    line: usize,
    from: u64,
}

impl Cursor {
    /// Next block at or above `from`, or `None` at end of file.
    async fn next_block(&mut self) -> ChainResult<Option<RawBlock>> {
        loop {
            let Some(text) = self
                .lines
                .next_line()
                .await
                .map_err(|e| ChainError::ReadError(e.to_string()))?
            else {
                return Ok(None);
            };
            self.line += 1;

            let Some(block) = decode_line(&text, self.line)? else {
                continue;
            };
            if block.number < self.from {
                trace!(block = block.number, "Before start, skipped");
                continue;
            }
            return Ok(Some(block));
        }
    }
}

/// Decode one archive line. `Ok(None)` for blank and comment lines.
fn decode_line(text: &str, line: usize) -> ChainResult<Option<RawBlock>> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| ChainError::BlockDecodeError {
            line,
            message: e.to_string(),
        })
}

#[async_trait]
impl BlockSource for ArchiveSource {
    async fn head(&self) -> ChainResult<Option<SourceHead>> {
        let mut cursor = Cursor {
            lines: self.lines().await?,
            line: 0,
            from: 0,
        };
        let mut head = None;
        while let Some(block) = cursor.next_block().await? {
            head = Some(SourceHead {
                number: block.number,
                hash: block.hash,
            });
        }
        Ok(head)
    }

    async fn blocks_from(&self, from: u64) -> ChainResult<BlockStream> {
        let cursor = Cursor {
            lines: self.lines().await?,
            line: 0,
            from,
        };

        let blocks = stream::try_unfold(cursor, |mut cursor| async move {
            let next = cursor.next_block().await?;
            Ok::<_, ChainError>(next.map(|block| (block, cursor)))
        });

        Ok(Box::pin(blocks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::io::Write;

    fn line(number: u64) -> String {
        format!(
            r#"{{"number": {number}, "hash": "0x{hash}", "parent_hash": "0x{parent}", "timestamp": 1650000000000,
                "events": [{{"index": 0, "name": "staking.Rewarded", "content_hash": "0fb9", "data": ["0x{acc}", "100"]}}]}}"#,
            hash = format!("{number:02x}").repeat(32),
            parent = format!("{:02x}", number.saturating_sub(1)).repeat(32),
            acc = "11".repeat(32),
        )
        .replace('\n', " ")
    }

    fn archive(lines: &[String]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for l in lines {
            writeln!(file, "{l}").unwrap();
        }
        file
    }

    #[tokio::test]
    async fn test_reads_blocks_from_start() {
        let file = archive(&[line(1), String::new(), "# comment".into(), line(2), line(3)]);
        let source = ArchiveSource::open(file.path()).await.unwrap();

        let blocks: Vec<RawBlock> = source.blocks_from(2).await.unwrap().try_collect().await.unwrap();
        let numbers: Vec<u64> = blocks.iter().map(|b| b.number).collect();
        assert_eq!(numbers, [2, 3]);
        assert_eq!(blocks[0].events[0].name, "staking.Rewarded");
        assert!(blocks[0].extrinsics.is_empty());
    }

    #[tokio::test]
    async fn test_head_is_last_block() {
        let file = archive(&[line(4), line(5)]);
        let head = ArchiveSource::new(file.path()).head().await.unwrap().unwrap();
        assert_eq!(head.number, 5);

        let empty = archive(&[]);
        assert!(ArchiveSource::new(empty.path()).head().await.unwrap().is_none());
    }

    // Test critique: une ligne corrompue doit être signalée avec son numéro
    #[tokio::test]
    async fn test_decode_error_reports_line() {
        let file = archive(&[line(1), "{\"number\": \"two\"}".into()]);
        let source = ArchiveSource::new(file.path());
        let result: ChainResult<Vec<RawBlock>> = source.blocks_from(0).await.unwrap().try_collect().await;

        match result {
            Err(ChainError::BlockDecodeError { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected a decode error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArchiveSource::open(dir.path().join("nope.ndjson")).await.unwrap_err();
        assert!(matches!(err, ChainError::ConnectionFailed(_)));

        let err = ArchiveSource::open(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("not a file"));
    }
}
