//! The archive-independent entry/status data model (spec §3).

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;

/// What kind of filesystem object an entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// No entry / unset.
    None,
    /// The archive member does not exist (used for dangling link targets).
    NotFound,
    /// A regular file.
    Regular,
    /// A directory.
    Directory,
    /// A symbolic link, or (see [`Status::hardlink`]) a hard link.
    Symlink,
    /// A block device special file.
    Block,
    /// A character device special file.
    Character,
    /// A named pipe.
    Fifo,
    /// A UNIX domain socket.
    Socket,
    /// Recognized but not one of the above.
    Unknown,
}

/// The metadata describing one archive member.
///
/// `hardlink` is only meaningful when `kind == Symlink`: it distinguishes
/// an in-archive hard link (`hardlink == true`, the target is another
/// archive member with the same content) from a true symbolic link
/// (`hardlink == false`, `linkname` is a textual path). This overload
/// mirrors the on-disk TAR typeflag split between `'1'` (hard link) and
/// `'2'` (symlink) and is kept as specified rather than split into a
/// separate enum, since the rest of this crate's data model is written
/// against this exact shape.
#[derive(Debug, Clone, Copy)]
pub struct Status {
    /// Size in bytes of the entry's payload (0 for directories).
    pub size: u64,
    /// Last-modified time.
    pub mtime: SystemTime,
    /// What kind of object this is.
    pub kind: EntryType,
    /// POSIX permission bits (lower 12 bits: setuid/setgid/sticky + rwxrwxrwx).
    pub perms: u32,
    /// See the type-level doc comment.
    pub hardlink: bool,
}

impl Status {
    /// A status describing a missing / nonexistent object.
    pub fn not_found() -> Self {
        Status {
            size: 0,
            mtime: SystemTime::UNIX_EPOCH,
            kind: EntryType::NotFound,
            perms: 0,
            hardlink: false,
        }
    }
}

/// One member of an archive.
pub trait Entry {
    /// The path as recorded in the archive.
    fn filename(&self) -> &Path;

    /// This entry's own status.
    fn file_status(&self) -> Status;

    /// For symlinks and hard links, the status of the link target; for
    /// other entry kinds, equal to `file_status()`.
    fn linked_status(&self) -> Status;

    /// For symlinks and hard links, the recorded or resolved target path;
    /// empty for other entry kinds.
    fn linkname(&self) -> &Path;

    /// Open a fresh, independent stream over this entry's payload.
    ///
    /// For directories this need not be called. For hard links, this
    /// opens the resolved target's payload.
    fn open(&self) -> Result<Box<dyn std::io::Read>>;
}

/// A read-only, randomly addressable collection of [`Entry`] values.
pub trait Archive {
    /// Number of entries.
    fn count(&self) -> usize;

    /// Fetch the entry at index `i`, or `None` if out of range.
    fn entry(&self, i: usize) -> Option<Box<dyn Entry>>;
}

/// Convenience: an owned path paired with nothing, used for entries with
/// no link target.
pub(crate) fn empty_path() -> PathBuf {
    PathBuf::new()
}
