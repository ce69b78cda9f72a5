//! Per-transfer resume sidecar.
//!
//! Layout: a 4-byte little-endian block counter at offset 0, followed by the
//! UTF-8 target file name filling the remainder of the file. The name's
//! length is implicit in the file length minus 4.

use lanshare_core::constants::SIDECAR_COUNTER_LEN;
use std::io;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

/// Crash-safe sidecar tracking a receive's resume state.
///
/// A freshly created sidecar has length 0. This implementation treats any
/// length of 4 bytes or less as fresh, since the counter alone (with no
/// name recorded yet) carries no usable resume state.
pub struct MetadataSidecar {
    file: File,
}

impl MetadataSidecar {
    /// Opens `path`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened or created.
    pub async fn open_or_create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await?;
        Ok(Self { file })
    }

    /// Returns whether this sidecar carries no usable resume state, i.e. its
    /// length is at most [`SIDECAR_COUNTER_LEN`] bytes.
    pub async fn is_fresh(&mut self) -> io::Result<bool> {
        let len = self.file.metadata().await?.len();
        Ok(len <= SIDECAR_COUNTER_LEN as u64)
    }

    /// Reads the persisted resume state: the last durably written block
    /// index and the target file name.
    ///
    /// Callers should only call this after confirming [`is_fresh`] is
    /// `false`.
    ///
    /// [`is_fresh`]: Self::is_fresh
    pub async fn read_state(&mut self) -> io::Result<(i32, String)> {
        self.file.seek(io::SeekFrom::Start(0)).await?;
        let mut counter_bytes = [0u8; SIDECAR_COUNTER_LEN];
        self.file.read_exact(&mut counter_bytes).await?;
        let last_written_block = i32::from_le_bytes(counter_bytes);

        let mut name_bytes = Vec::new();
        self.file.read_to_end(&mut name_bytes).await?;
        let name = String::from_utf8(name_bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        Ok((last_written_block, name))
    }

    /// Persists the last durably written block index.
    ///
    /// Seeks to offset 0, writes the 4-byte little-endian counter, and
    /// flushes before returning — callers must await this before advancing
    /// any in-memory progress counter.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the seek, write, or flush fails.
    pub async fn write_last_block(&mut self, last_written_block: i32) -> io::Result<()> {
        self.file.seek(io::SeekFrom::Start(0)).await?;
        self.file
            .write_all(&last_written_block.to_le_bytes())
            .await?;
        self.file.flush().await?;
        self.file.sync_data().await?;
        debug!(last_written_block, "synced sidecar counter to disk");
        Ok(())
    }

    /// Persists the target file name, truncating the sidecar to
    /// `4 + name.len()` bytes first. If the sidecar was
    /// shorter than 4 bytes, the counter bytes become zero-filled by the
    /// truncate-and-extend, i.e. a fresh sidecar's counter starts at 0.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the resize, seek, write, or flush fails.
    pub async fn write_file_name(&mut self, name: &str) -> io::Result<()> {
        let desired_len = (SIDECAR_COUNTER_LEN + name.len()) as u64;
        self.file.set_len(desired_len).await?;
        self.file
            .seek(io::SeekFrom::Start(SIDECAR_COUNTER_LEN as u64))
            .await?;
        self.file.write_all(name.as_bytes()).await?;
        self.file.flush().await?;
        debug!(name, "persisted sidecar target file name");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn fresh_sidecar_has_no_resume_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc123");
        let mut sidecar = MetadataSidecar::open_or_create(&path).await.unwrap();
        assert!(sidecar.is_fresh().await.unwrap());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc123");
        let mut sidecar = MetadataSidecar::open_or_create(&path).await.unwrap();

        sidecar.write_file_name("report.pdf").await.unwrap();
        sidecar.write_last_block(3).await.unwrap();

        assert!(!sidecar.is_fresh().await.unwrap());
        let (block, name) = sidecar.read_state().await.unwrap();
        assert_eq!(block, 3);
        assert_eq!(name, "report.pdf");
    }

    #[tokio::test]
    async fn writing_a_new_name_truncates_to_the_new_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc123");
        let mut sidecar = MetadataSidecar::open_or_create(&path).await.unwrap();

        sidecar.write_file_name("a-long-file-name.bin").await.unwrap();
        sidecar.write_file_name("short.bin").await.unwrap();

        let (_, name) = sidecar.read_state().await.unwrap();
        assert_eq!(name, "short.bin");
    }
}
