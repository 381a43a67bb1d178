use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;
use crate::model::{EntryType, Status};

/// A seekable file on disk, capturing its own status at open time.
///
/// Grounded on the original design's `file::open`, which eagerly calls
/// `stat`/`lstat`/`readlink` when a file handle is constructed rather than
/// lazily on demand; this lets callers inspect a file's link target
/// without a second syscall round-trip.
pub struct ArchFile {
    file: fs::File,
    file_status: Status,
    linked_status: Status,
    linkname: PathBuf,
}

impl ArchFile {
    /// Open `path` for reading, capturing status/link metadata.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path)?;

        let followed = fs::metadata(path)?;
        let file_status = status_from_metadata(&followed);

        let (linked_status, linkname) = match fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = fs::read_link(path).unwrap_or_default();
                let linked = fs::metadata(path)
                    .map(|m| status_from_metadata(&m))
                    .unwrap_or_else(|_| Status::not_found());
                (linked, target)
            }
            _ => (file_status, PathBuf::new()),
        };

        Ok(ArchFile {
            file,
            file_status,
            linked_status,
            linkname,
        })
    }

    /// This file's own status (symlinks followed).
    pub fn file_status(&self) -> Status {
        self.file_status
    }

    /// The status of the link target, if this path is a symlink.
    pub fn linked_status(&self) -> Status {
        self.linked_status
    }

    /// The textual symlink target, empty if this path is not a symlink.
    pub fn linkname(&self) -> &Path {
        &self.linkname
    }
}

#[cfg(unix)]
fn status_from_metadata(meta: &fs::Metadata) -> Status {
    use std::os::unix::fs::{MetadataExt, PermissionsExt};

    let kind = if meta.is_dir() {
        EntryType::Directory
    } else if meta.is_file() {
        EntryType::Regular
    } else if meta.file_type().is_symlink() {
        EntryType::Symlink
    } else if meta.file_type().is_fifo() {
        EntryType::Fifo
    } else if meta.file_type().is_socket() {
        EntryType::Socket
    } else if meta.file_type().is_block_device() {
        EntryType::Block
    } else if meta.file_type().is_char_device() {
        EntryType::Character
    } else {
        EntryType::Unknown
    };

    Status {
        size: meta.size(),
        mtime: meta
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH),
        kind,
        perms: meta.permissions().mode() & 0o7777,
        hardlink: false,
    }
}

#[cfg(not(unix))]
fn status_from_metadata(meta: &fs::Metadata) -> Status {
    let kind = if meta.is_dir() {
        EntryType::Directory
    } else if meta.is_file() {
        EntryType::Regular
    } else {
        EntryType::Unknown
    };

    Status {
        size: meta.len(),
        mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        kind,
        perms: 0o644,
        hardlink: false,
    }
}

impl Read for ArchFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for ArchFile {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.file.seek(pos)
    }
}
