//! The ZIP archive reader (spec §4.7): a thin adapter over the `zip`
//! crate, the one genuinely external archive library in this crate's
//! dependency set.
//!
//! Grounded on `original_source/src/zip/archive.cc`'s callback-based
//! wrapper around an external ZIP library: the same "thin facade"
//! framing, substituting the real `zip` crate for the C library the
//! original wraps.

use std::cell::RefCell;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

use zip::ZipArchive;

use crate::error::Result;
use crate::io::ReadSeek;
use crate::model::{Archive, Entry, EntryType, Status};
use crate::sniff::peek_magic;

const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];

const DEFAULT_PERMS: u32 = 0o644;

/// A ZIP archive, opened via the `zip` crate.
pub struct ZipArchiveAdapter {
    archive: Rc<RefCell<ZipArchive<Box<dyn ReadSeek>>>>,
}

impl ZipArchiveAdapter {
    /// Peek the local-file-header magic at offset 0.
    pub fn is_valid(file: &mut dyn ReadSeek) -> std::io::Result<bool> {
        peek_magic(file, &ZIP_MAGIC)
    }

    /// Open `file` as a ZIP archive.
    pub fn open(file: Box<dyn ReadSeek>) -> Result<ZipArchiveAdapter> {
        let archive = ZipArchive::new(file)?;
        Ok(ZipArchiveAdapter {
            archive: Rc::new(RefCell::new(archive)),
        })
    }
}

fn mtime_to_system_time(dt: &zip::DateTime) -> SystemTime {
    use chrono::{NaiveDate, TimeZone, Utc};

    let naive_date = NaiveDate::from_ymd_opt(dt.year() as i32, dt.month() as u32, dt.day() as u32);
    let Some(date) = naive_date else {
        return SystemTime::UNIX_EPOCH;
    };
    let Some(naive) =
        date.and_hms_opt(dt.hour() as u32, dt.minute() as u32, dt.second() as u32)
    else {
        return SystemTime::UNIX_EPOCH;
    };

    match Utc.from_local_datetime(&naive).single() {
        Some(utc) => SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(utc.timestamp().max(0) as u64),
        None => SystemTime::UNIX_EPOCH,
    }
}

impl Archive for ZipArchiveAdapter {
    fn count(&self) -> usize {
        self.archive.borrow().len()
    }

    fn entry(&self, i: usize) -> Option<Box<dyn Entry>> {
        let mut archive = self.archive.borrow_mut();
        let zf = archive.by_index_raw(i).ok()?;

        let filename = PathBuf::from(zf.name());
        // Per spec §4.7, this facade always reports `Regular`; the
        // underlying library's own `is_dir()`/symlink classification is
        // only consulted for the fallback permission default below.
        let perms = zf.unix_mode().unwrap_or(DEFAULT_PERMS) & 0o7777;
        let mtime = match zf.last_modified() {
            Some(dt) => mtime_to_system_time(&dt),
            None => SystemTime::UNIX_EPOCH,
        };
        let status = Status {
            size: zf.size(),
            mtime,
            kind: EntryType::Regular,
            perms,
            hardlink: false,
        };

        Some(Box::new(ZipEntry {
            filename,
            status,
            archive: self.archive.clone(),
            index: i,
        }))
    }
}

struct ZipEntry {
    filename: PathBuf,
    status: Status,
    archive: Rc<RefCell<ZipArchive<Box<dyn ReadSeek>>>>,
    index: usize,
}

impl Entry for ZipEntry {
    fn filename(&self) -> &Path {
        &self.filename
    }

    fn file_status(&self) -> Status {
        self.status
    }

    fn linked_status(&self) -> Status {
        self.status
    }

    fn linkname(&self) -> &Path {
        Path::new("")
    }

    fn open(&self) -> Result<Box<dyn Read>> {
        // `ZipFile<'_>` borrows the archive for the read's lifetime, and
        // this trait needs an owned, 'static stream; eagerly decode the
        // entry instead of streaming it (see DESIGN.md).
        let mut archive = self.archive.borrow_mut();
        let mut zf = archive.by_index(self.index)?;
        let mut buf = Vec::with_capacity(zf.size() as usize);
        zf.read_to_end(&mut buf)?;
        Ok(Box::new(Cursor::new(buf)))
    }
}
