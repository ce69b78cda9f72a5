//! Block-level file accessor.

use crate::sidecar::MetadataSidecar;
use lanshare_core::constants::BLOCK_SIZE;
use std::io;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::watch;

/// Reads or writes a file one fixed-size block at a time, optionally
/// persisting resume state to a [`MetadataSidecar`] as it goes.
///
/// The accessor owns a single reusable `BLOCK_SIZE` read buffer; like
/// [`crate::FramedChannel::receive`], [`BlockAccessor::read_next_block`]
/// borrows from it rather than allocating per call.
pub struct BlockAccessor {
    file: File,
    declared_size: i64,
    last_processed_block: i64,
    read_buf: Vec<u8>,
    sidecar: Option<MetadataSidecar>,
    progress_tx: Option<watch::Sender<i64>>,
}

impl BlockAccessor {
    /// Wraps `file`, whose declared total size is `declared_size` bytes.
    #[must_use]
    pub fn new(file: File, declared_size: i64) -> Self {
        Self {
            file,
            declared_size,
            last_processed_block: 0,
            read_buf: vec![0u8; BLOCK_SIZE],
            sidecar: None,
            progress_tx: None,
        }
    }

    /// Attaches a sidecar so `write_next_block` persists resume state.
    #[must_use]
    pub fn with_sidecar(mut self, sidecar: MetadataSidecar) -> Self {
        self.sidecar = Some(sidecar);
        self
    }

    /// Returns the declared total size of the file in bytes.
    #[must_use]
    pub const fn declared_size(&self) -> i64 {
        self.declared_size
    }

    /// Returns the index of the block last fully read or durably written.
    #[must_use]
    pub const fn last_processed_block(&self) -> i64 {
        self.last_processed_block
    }

    /// Subscribes to "last-processed-block changed" notifications. The
    /// first call creates the underlying channel; later subscribers observe
    /// updates from that point onward, matching `watch`'s normal semantics.
    pub fn subscribe_progress(&mut self) -> watch::Receiver<i64> {
        match &self.progress_tx {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = watch::channel(self.last_processed_block);
                self.progress_tx = Some(tx);
                rx
            }
        }
    }

    /// Positions the file at block `n` and sets `last_processed_block` to
    /// `n`. Returns whether the new position is at or past EOF.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the seek fails.
    pub async fn seek_to_block(&mut self, n: i64) -> io::Result<bool> {
        let offset = n.saturating_mul(BLOCK_SIZE as i64).max(0) as u64;
        self.file.seek(io::SeekFrom::Start(offset)).await?;
        self.last_processed_block = n;
        Ok(offset >= self.declared_size.max(0) as u64)
    }

    /// Reads up to `BLOCK_SIZE` bytes at the current position, returning a
    /// view over the bytes actually read (empty at EOF). Advances
    /// `last_processed_block` by one regardless of how many bytes were
    /// read.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the underlying read fails.
    pub async fn read_next_block(&mut self) -> io::Result<&[u8]> {
        let mut total = 0;
        loop {
            let n = self.file.read(&mut self.read_buf[total..]).await?;
            if n == 0 {
                break;
            }
            total += n;
            if total == self.read_buf.len() {
                break;
            }
        }
        self.last_processed_block += 1;
        self.notify_progress();
        Ok(&self.read_buf[..total])
    }

    /// Appends `bytes` at the current position. If a sidecar is attached,
    /// persists the new `last_processed_block` value to it *before*
    /// advancing the in-memory counter, so a crash mid-write causes the
    /// partially written block to be re-requested rather than skipped.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the write or the sidecar persistence fails.
    pub async fn write_next_block(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes).await?;
        self.file.flush().await?;

        let new_block = self.last_processed_block + 1;
        if let Some(sidecar) = self.sidecar.as_mut() {
            sidecar.write_last_block(new_block as i32).await?;
        }

        self.last_processed_block = new_block;
        self.notify_progress();
        Ok(())
    }

    fn notify_progress(&self) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(self.last_processed_block);
        }
    }

    /// Detaches and returns the sidecar, if any, e.g. so the caller can
    /// delete it on successful completion.
    pub fn take_sidecar(&mut self) -> Option<MetadataSidecar> {
        self.sidecar.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::fs::OpenOptions;

    async fn open_rw(path: &std::path::Path) -> File {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn write_then_read_back_matches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("payload.bin");

        let data = vec![7u8; BLOCK_SIZE + 100];
        {
            let file = open_rw(&path).await;
            let mut writer = BlockAccessor::new(file, data.len() as i64);
            writer.write_next_block(&data[..BLOCK_SIZE]).await.unwrap();
            writer.write_next_block(&data[BLOCK_SIZE..]).await.unwrap();
            assert_eq!(writer.last_processed_block(), 2);
        }

        let file = open_rw(&path).await;
        let mut reader = BlockAccessor::new(file, data.len() as i64);
        let first = reader.read_next_block().await.unwrap().to_vec();
        let second = reader.read_next_block().await.unwrap().to_vec();
        let third = reader.read_next_block().await.unwrap();

        assert_eq!(first.len(), BLOCK_SIZE);
        assert_eq!(second.len(), 100);
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn sidecar_counter_updates_before_in_memory_counter_is_observed() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("payload.bin");
        let sidecar_path = dir.path().join("sidecar");

        let file = open_rw(&file_path).await;
        let sidecar = MetadataSidecar::open_or_create(&sidecar_path).await.unwrap();
        let mut accessor = BlockAccessor::new(file, BLOCK_SIZE as i64).with_sidecar(sidecar);

        accessor.write_next_block(&[1u8; BLOCK_SIZE]).await.unwrap();
        assert_eq!(accessor.last_processed_block(), 1);

        let mut sidecar = MetadataSidecar::open_or_create(&sidecar_path).await.unwrap();
        sidecar.write_file_name("placeholder").await.unwrap();
        let (persisted_block, _) = sidecar.read_state().await.unwrap();
        assert_eq!(persisted_block, 1);
    }

    #[tokio::test]
    async fn progress_channel_reports_each_block() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        let file = open_rw(&path).await;
        let mut accessor = BlockAccessor::new(file, (BLOCK_SIZE * 2) as i64);
        let mut rx = accessor.subscribe_progress();

        accessor.write_next_block(&[0u8; BLOCK_SIZE]).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
    }
}
