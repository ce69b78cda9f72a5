//! Collaborator interfaces from the core outward.
//!
//! `FilePicker` and its bookmark-persistence layer are explicitly out of
//! scope and have no trait here; callers supply file paths
//! directly.

use std::io;
use std::path::PathBuf;

/// The user's answer to a name conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Delete the existing file and reuse its name.
    Overwrite,
    /// Generate a unique `name (n).ext` and use that instead.
    Rename,
    /// Abort the transfer; surfaces as [`crate::ExchangeError::LocalCancelled`].
    Abort,
}

/// Asks an external collaborator how to resolve a single name conflict.
pub trait ConflictPrompt: Send + Sync {
    /// Returns how to proceed given that `candidate` already exists.
    fn resolve(&self, candidate: &str) -> ConflictResolution;
}

/// Broader user-facing prompts a session may need.
///
/// The CLI driver is the only implementer in this workspace; a GUI host
/// would supply its own.
pub trait UserPrompts: Send + Sync {
    /// Asks the user to confirm an incoming transfer of `name`/`size`.
    fn confirm_transfer(&self, name: &str, size: i64) -> bool;
    /// Asks the user how to resolve a name conflict for `name`.
    fn resolve_conflict(&self, name: &str) -> ConflictResolution;
    /// Reports an error message to the user.
    fn report_error(&self, message: &str);
}

/// A directory the core is allowed to create files and subdirectories in.
///
/// The core never touches anything outside the handle it was given.
/// Implementations are expected to be cheap to clone/share;
/// methods take `&self`.
pub trait Folder: Send + Sync {
    /// The type returned by [`get_or_create_sub`](Self::get_or_create_sub).
    type Sub: Folder;

    /// Opens (creating if absent) the subdirectory `name`.
    fn get_or_create_sub(&self, name: &str) -> io::Result<Self::Sub>;
    /// Opens (creating if absent) the file `name`, returning its path.
    fn get_or_create_file(&self, name: &str) -> io::Result<PathBuf>;
    /// Deletes the file `name` if it exists.
    fn delete_file(&self, name: &str) -> io::Result<()>;
    /// Returns whether `name` exists directly under this folder.
    fn file_exists(&self, name: &str) -> bool;
    /// Creates the file `name`, failing if it already exists.
    fn create_file(&self, name: &str) -> io::Result<PathBuf>;

    /// Returns, in order, whether each of `names` exists directly under this
    /// folder.
    ///
    /// Lets conflict resolution probe a batch of candidate names with one
    /// call instead of one round trip per name. The default forwards to
    /// [`file_exists`](Self::file_exists); implementations backed by a real
    /// file system should override this with a single batched stat.
    fn files_exist(&self, names: &[String]) -> Vec<bool> {
        names.iter().map(|name| self.file_exists(name)).collect()
    }
}
