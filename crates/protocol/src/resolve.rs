//! On-disk file resolution, receiver side only.

use crate::traits::{ConflictPrompt, ConflictResolution, Folder};
use crate::ExchangeError;
use checksums::ContentHash;
use std::path::{Path, PathBuf};
use transport::MetadataSidecar;

/// The outcome of resolving an incoming transfer's target file: a sidecar
/// ready for reads/writes, the path of the file to stream into, the block
/// index to resume from, and a handle back to the sidecar's containing
/// directory so the caller can delete it on successful completion.
pub struct ResolvedFile<S> {
    /// The sidecar tracking this transfer's resume state.
    pub sidecar: MetadataSidecar,
    /// Path of the file to write transferred blocks into.
    pub file_path: PathBuf,
    /// Block index the sender should resume from.
    pub resume_from_block: i32,
    /// The `rootDir/metadataDirName` folder the sidecar lives in.
    pub metadata_dir: S,
    /// The sidecar's file name within `metadata_dir` (`hex(hash)`).
    pub metadata_file_name: String,
}

/// Resolves the on-disk target for an incoming transfer.
///
/// Opens or creates `rootDir/metadataDirName/hex(hash)` as the sidecar. If
/// it already carries resume state and the file it names still exists, that
/// state is reused as-is. Otherwise, `receivedFileName` is run through
/// conflict resolution against `root` and the sidecar is (re)initialised
/// with `lastWrittenBlock = 0`.
///
/// # Errors
///
/// Returns [`ExchangeError::Io`] on any file-system fault, or
/// [`ExchangeError::LocalCancelled`] if the conflict prompt chooses to
/// abort.
pub async fn resolve_incoming_file<F, C>(
    root: &F,
    metadata_dir_name: &str,
    received_file_name: &str,
    hash: &ContentHash,
    conflict: &C,
) -> Result<ResolvedFile<F::Sub>, ExchangeError>
where
    F: Folder,
    C: ConflictPrompt,
{
    let metadata_dir = root.get_or_create_sub(metadata_dir_name)?;
    let metadata_file_name = hash.to_hex();
    let metadata_path = metadata_dir.get_or_create_file(&metadata_file_name)?;

    let mut sidecar = MetadataSidecar::open_or_create(&metadata_path).await?;
    let fresh = sidecar.is_fresh().await?;

    if !fresh {
        let (last_written_block, actual_name) = sidecar.read_state().await?;
        if root.file_exists(&actual_name) {
            let file_path = root.get_or_create_file(&actual_name)?;
            return Ok(ResolvedFile {
                sidecar,
                file_path,
                resume_from_block: last_written_block,
                metadata_dir,
                metadata_file_name,
            });
        }
    }

    let resolved_name = resolve_conflict(root, received_file_name, conflict)?;
    let file_path = root.get_or_create_file(&resolved_name)?;

    sidecar.write_file_name(&resolved_name).await?;
    sidecar.write_last_block(0).await?;

    Ok(ResolvedFile {
        sidecar,
        file_path,
        resume_from_block: 0,
        metadata_dir,
        metadata_file_name,
    })
}

/// Picks a name to write to, prompting for conflict resolution if
/// `candidate` already exists under `root`.
fn resolve_conflict<F, C>(root: &F, candidate: &str, conflict: &C) -> Result<String, ExchangeError>
where
    F: Folder,
    C: ConflictPrompt,
{
    if !root.file_exists(candidate) {
        return Ok(candidate.to_string());
    }

    match conflict.resolve(candidate) {
        ConflictResolution::Overwrite => {
            root.delete_file(candidate)?;
            Ok(candidate.to_string())
        }
        ConflictResolution::Rename => Ok(first_available_rename(root, candidate)),
        ConflictResolution::Abort => Err(ExchangeError::LocalCancelled),
    }
}

/// Probes `name (n).ext` in batches of 5, returning the lowest `n` whose
/// name is not already taken.
fn first_available_rename<F: Folder>(root: &F, candidate: &str) -> String {
    let mut start = 1u32;
    loop {
        let batch: Vec<String> = (start..start + 5).map(|n| numbered_variant(candidate, n)).collect();
        let exists = root.files_exist(&batch);
        if let Some(free) = batch.into_iter().zip(exists).find(|(_, taken)| !taken).map(|(name, _)| name) {
            return free;
        }
        start += 5;
    }
}

fn numbered_variant(candidate: &str, n: u32) -> String {
    let path = Path::new(candidate);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => format!(
            "{} ({n}).{}",
            stem.to_string_lossy(),
            ext.to_string_lossy()
        ),
        _ => format!("{candidate} ({n})"),
    }
}
