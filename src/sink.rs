//! Byte-sink capability for response bodies.
//!
//! The segment executor depends only on this interface; concrete sinks exist
//! per target (a positioned file region, or an in-memory buffer for tests).

use std::io;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncSeekExt, AsyncWriteExt, SeekFrom};

/// Destination for one segment's streamed bytes.
pub trait SegmentSink: Send {
    /// Appends a chunk at the current position.
    fn append(&mut self, chunk: &[u8]) -> impl std::future::Future<Output = io::Result<()>> + Send;

    /// Discards any bytes written so far and repositions at the segment
    /// start. Called before every retry attempt so a failed attempt's partial
    /// bytes are overwritten, never appended.
    fn rewind(&mut self) -> impl std::future::Future<Output = io::Result<()>> + Send;

    /// Flushes buffered bytes to their durable destination.
    fn flush(&mut self) -> impl std::future::Future<Output = io::Result<()>> + Send;
}

/// Writes a segment's bytes into the shared destination file at the segment's
/// own offset. Each executor holds its own handle; ranges are disjoint by
/// construction, so no byte-range locking is needed.
pub struct FileRegionSink {
    file: tokio::fs::File,
    start_offset: u64,
}

impl FileRegionSink {
    /// Opens the destination (creating it if missing, never truncating) and
    /// seeks to the region start.
    pub async fn open(path: &Path, start_offset: u64) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await?;
        file.seek(SeekFrom::Start(start_offset)).await?;
        Ok(Self { file, start_offset })
    }
}

impl SegmentSink for FileRegionSink {
    async fn append(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await
    }

    async fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(self.start_offset)).await?;
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.file.flush().await
    }
}

/// In-memory sink used by tests.
#[derive(Default)]
pub struct BufferSink {
    bytes: Vec<u8>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl SegmentSink for BufferSink {
    async fn append(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    async fn rewind(&mut self) -> io::Result<()> {
        self.bytes.clear();
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buffer_sink_rewind_discards_partial_bytes() {
        let mut sink = BufferSink::new();
        sink.append(b"partial attempt").await.unwrap();
        sink.rewind().await.unwrap();
        sink.append(b"clean retry").await.unwrap();
        assert_eq!(sink.bytes(), b"clean retry");
    }

    #[tokio::test]
    async fn file_region_sink_writes_at_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region.bin");
        tokio::fs::write(&path, b"0123456789").await.unwrap();

        let mut sink = FileRegionSink::open(&path, 4).await.unwrap();
        sink.append(b"WXYZ").await.unwrap();
        sink.flush().await.unwrap();
        drop(sink);

        let contents = tokio::fs::read(&path).await.unwrap();
        assert_eq!(contents, b"0123WXYZ89");
    }

    #[tokio::test]
    async fn file_region_sink_rewind_overwrites_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retry.bin");

        let mut sink = FileRegionSink::open(&path, 0).await.unwrap();
        sink.append(b"bad attempt bytes").await.unwrap();
        sink.rewind().await.unwrap();
        sink.append(b"good").await.unwrap();
        sink.flush().await.unwrap();
        drop(sink);

        let contents = tokio::fs::read(&path).await.unwrap();
        assert_eq!(&contents[..4], b"good");
    }
}
