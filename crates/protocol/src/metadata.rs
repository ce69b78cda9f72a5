//! File metadata exchanged at the start of a transfer.

use checksums::ContentHash;

/// `{ name, hash, size }` as exchanged over three `Metadata` frames.
/// `size` stays `int32` to match the dominant wire format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileMetadata {
    /// UTF-8 file name as proposed by the sender.
    pub name: String,
    /// Sender-supplied content hash, used only as a resume identity key.
    pub hash: ContentHash,
    /// Declared file size in bytes.
    pub size: i32,
}

impl FileMetadata {
    /// Builds a metadata record from its constituent parts.
    #[must_use]
    pub fn new(name: impl Into<String>, hash: ContentHash, size: i32) -> Self {
        Self {
            name: name.into(),
            hash,
            size,
        }
    }
}
