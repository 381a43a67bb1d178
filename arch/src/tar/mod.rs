//! The TAR archive reader (spec §4.6): the hardest piece of this crate.
//!
//! Grounded extensively on `original_source/src/tar/archive.cc`:
//! `load_entries`/`next` (header walk with GNU longname/longlink
//! stitching), `apply_gnulong`, `normlized`/`realpath_impl` (symlink
//! target resolution), and `hardlink_for`.

mod header;

use std::cell::RefCell;
use std::collections::HashSet;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, SystemTime};

use crate::error::{Error, Result};
use crate::io::ReadSeek;
use crate::model::{self, Archive, Entry, EntryType, Status};

use header::{as_num, checksums, round_up_to_record, trim_nul, RECORD_SIZE};

const TYPE_REGULAR_0: u8 = b'0';
const TYPE_REGULAR_NUL: u8 = 0;
const TYPE_HARDLINK: u8 = b'1';
const TYPE_SYMLINK: u8 = b'2';
const TYPE_CHARACTER: u8 = b'3';
const TYPE_BLOCK: u8 = b'4';
const TYPE_DIRECTORY: u8 = b'5';
const TYPE_FIFO: u8 = b'6';
const TYPE_CONTIGUOUS: u8 = b'7';
const TYPE_GNU_LONGNAME: u8 = b'L';
const TYPE_GNU_LONGLINK: u8 = b'K';
const TYPE_GNU_SPARSE: u8 = b'S';

#[derive(Debug, Clone)]
struct Record {
    name: PathBuf,
    typeflag: u8,
    size: u64,
    mtime: i64,
    mode: u32,
    linkname: PathBuf,
    data_offset: u64,
}

fn has_data(typeflag: u8) -> bool {
    matches!(
        typeflag,
        TYPE_REGULAR_0 | TYPE_REGULAR_NUL | TYPE_CONTIGUOUS | TYPE_GNU_SPARSE
    )
}

fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    #[cfg(unix)]
    {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;
        PathBuf::from(OsStr::from_bytes(bytes))
    }
    #[cfg(not(unix))]
    {
        PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
    }
}

struct RawHeader {
    name: Vec<u8>,
    mode: u32,
    size: u64,
    mtime: i64,
    typeflag: u8,
    linkname: Vec<u8>,
    prefix: Vec<u8>,
}

fn parse_header(record: &[u8; 512]) -> Option<RawHeader> {
    let (unsigned, signed) = checksums(record);
    let chksum = as_num(&record[148..156])?;
    if unsigned != chksum && signed != chksum {
        return None;
    }

    let name = trim_nul(&record[0..100]);
    let mode = as_num(&record[100..108]).unwrap_or(0).max(0) as u32;
    let size = as_num(&record[124..136]).unwrap_or(0).max(0) as u64;
    let mtime = as_num(&record[136..148]).unwrap_or(0);
    let typeflag = record[156];
    let linkname = trim_nul(&record[157..257]);
    let prefix = trim_nul(&record[345..500]);

    Some(RawHeader {
        name,
        mode,
        size,
        mtime,
        typeflag,
        linkname,
        prefix,
    })
}

fn read_record(file: &mut dyn ReadSeek) -> std::io::Result<Option<[u8; 512]>> {
    let mut buf = [0u8; 512];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Ok(Some(buf));
        }
        filled += n;
    }
    Ok(Some(buf))
}

/// An archive following the USTAR/GNU-tar on-disk layout, optionally
/// wrapped in a decompressing stream upstream of this type.
pub struct TarArchive {
    file: Rc<RefCell<Box<dyn ReadSeek>>>,
    records: Vec<Record>,
}

impl TarArchive {
    /// Peek whether `file` looks like a TAR archive: either the USTAR
    /// magic is present, or the first header's checksum validates.
    pub fn is_valid(file: &mut dyn ReadSeek) -> std::io::Result<bool> {
        file.seek(SeekFrom::Start(0))?;
        let record = match read_record(file)? {
            Some(r) => r,
            None => {
                file.seek(SeekFrom::Start(0))?;
                return Ok(false);
            }
        };
        file.seek(SeekFrom::Start(0))?;

        if &record[257..262] == b"ustar" {
            return Ok(true);
        }
        Ok(parse_header(&record).is_some())
    }

    /// Parse every header in `file` and return the archive.
    pub fn open(file: Box<dyn ReadSeek>) -> Result<TarArchive> {
        let shared: Rc<RefCell<Box<dyn ReadSeek>>> = Rc::new(RefCell::new(file));
        let records = load_entries(&shared)?;
        Ok(TarArchive {
            file: shared,
            records,
        })
    }

    fn find_by_name(&self, name: &Path) -> Option<usize> {
        self.records.iter().position(|r| r.name == name)
    }

    fn hardlink_for(&self, i: usize) -> usize {
        match self.find_by_name(&self.records[i].linkname) {
            Some(j) => j,
            None => i,
        }
    }

    /// Resolve a symlink's ultimate non-symlink target, returning
    /// `self.records.len()` (a sentinel) if it is dangling or cyclic.
    fn realpath(&self, i: usize) -> usize {
        let mut visited = HashSet::new();
        let mut current = i;
        loop {
            if !visited.insert(current) {
                return self.records.len();
            }
            let rec = &self.records[current];
            if rec.typeflag != TYPE_SYMLINK {
                return current;
            }
            let parent = rec.name.parent().unwrap_or(Path::new(""));
            let target = normalize(parent, &rec.linkname);
            match self.find_by_name(&target) {
                Some(j) => current = j,
                None => return self.records.len(),
            }
        }
    }

    fn status_of(&self, i: usize) -> Status {
        let rec = &self.records[i];
        let kind = classify(rec.typeflag, &rec.name);
        Status {
            size: if has_data(rec.typeflag) { rec.size } else { 0 },
            mtime: mtime_from_secs(rec.mtime),
            kind,
            perms: rec.mode & 0o7777,
            hardlink: rec.typeflag == TYPE_HARDLINK,
        }
    }
}

fn mtime_from_secs(secs: i64) -> SystemTime {
    if secs >= 0 {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        SystemTime::UNIX_EPOCH
    }
}

fn classify(typeflag: u8, name: &Path) -> EntryType {
    match typeflag {
        TYPE_REGULAR_0 | TYPE_REGULAR_NUL | TYPE_CONTIGUOUS | TYPE_GNU_SPARSE => {
            if name.as_os_str().is_empty() {
                EntryType::Unknown
            } else {
                EntryType::Regular
            }
        }
        TYPE_HARDLINK | TYPE_SYMLINK => EntryType::Symlink,
        TYPE_CHARACTER => EntryType::Character,
        TYPE_BLOCK => EntryType::Block,
        TYPE_DIRECTORY => EntryType::Directory,
        TYPE_FIFO => EntryType::Fifo,
        _ => EntryType::Unknown,
    }
}

/// Normalize `parent / link`, collapsing `.` segments and resolving
/// `..` segments lexically. Grounded on `archive.cc`'s `normlized`.
fn normalize(parent: &Path, link: &Path) -> PathBuf {
    let mut stack: Vec<std::ffi::OsString> = Vec::new();
    // Leading `..` segments that can't be popped against anything
    // collected so far carry through to the result instead of being
    // silently dropped.
    let mut leading_unresolved: usize = 0;
    for component in parent.components().chain(link.components()) {
        use std::path::Component::*;
        match component {
            CurDir | RootDir | Prefix(_) => {}
            ParentDir => {
                if stack.pop().is_none() {
                    leading_unresolved += 1;
                }
            }
            Normal(seg) => stack.push(seg.to_os_string()),
        }
    }
    let mut out = PathBuf::new();
    for _ in 0..leading_unresolved {
        out.push("..");
    }
    for seg in stack {
        out.push(seg);
    }
    out
}

fn load_entries(file: &Rc<RefCell<Box<dyn ReadSeek>>>) -> Result<Vec<Record>> {
    {
        let mut f = file.borrow_mut();
        f.seek(SeekFrom::Start(0))?;
        let mut probe = [0u8; 1];
        let n = f.read(&mut probe)?;
        f.seek(SeekFrom::Start(0))?;
        if n == 0 {
            return Err(Error::InvalidTarHeader("empty file".into()));
        }
    }

    let mut entries = Vec::new();
    let mut offset = 0u64;
    let mut pending_name: Option<Vec<u8>> = None;
    let mut pending_linkname: Option<Vec<u8>> = None;

    loop {
        let record = {
            let mut f = file.borrow_mut();
            f.seek(SeekFrom::Start(offset))?;
            match read_record(&mut **f)? {
                Some(r) => r,
                None => break,
            }
        };

        let header = match parse_header(&record) {
            Some(h) => h,
            None => break,
        };

        let data_offset = offset + RECORD_SIZE;

        if header.typeflag == TYPE_GNU_LONGNAME || header.typeflag == TYPE_GNU_LONGLINK {
            let data = read_payload(file, data_offset, header.size)?;
            let trimmed = trim_nul(&data);
            if header.typeflag == TYPE_GNU_LONGNAME {
                pending_name = Some(trimmed);
            } else {
                pending_linkname = Some(trimmed);
            }
            offset = data_offset + round_up_to_record(header.size);
            continue;
        }

        let mut name_bytes = header.name.clone();
        if !header.prefix.is_empty() {
            let mut joined = header.prefix.clone();
            joined.push(b'/');
            joined.extend_from_slice(&name_bytes);
            name_bytes = joined;
        }
        if let Some(n) = pending_name.take() {
            name_bytes = n;
        }

        let mut linkname_bytes = header.linkname.clone();
        if let Some(l) = pending_linkname.take() {
            linkname_bytes = l;
        }

        let mut name = bytes_to_path(&name_bytes);
        let mut typeflag = header.typeflag;
        if typeflag == TYPE_REGULAR_NUL && name_bytes.ends_with(b"/") {
            typeflag = TYPE_DIRECTORY;
        }
        if typeflag == TYPE_DIRECTORY {
            let trimmed = name_bytes
                .iter()
                .rev()
                .skip_while(|&&b| b == b'/')
                .count();
            name = bytes_to_path(&name_bytes[..trimmed]);
        }

        let next = if has_data(typeflag) {
            data_offset + round_up_to_record(header.size)
        } else {
            data_offset
        };

        entries.push(Record {
            name,
            typeflag,
            size: header.size,
            mtime: header.mtime,
            mode: header.mode,
            linkname: bytes_to_path(&linkname_bytes),
            data_offset,
        });

        offset = next;
    }

    Ok(entries)
}

fn read_payload(
    file: &Rc<RefCell<Box<dyn ReadSeek>>>,
    offset: u64,
    size: u64,
) -> Result<Vec<u8>> {
    let mut f = file.borrow_mut();
    f.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; size as usize];
    let mut filled = 0usize;
    while filled < buf.len() {
        let n = f.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

impl Archive for TarArchive {
    fn count(&self) -> usize {
        self.records.len()
    }

    fn entry(&self, i: usize) -> Option<Box<dyn Entry>> {
        if i >= self.records.len() {
            return None;
        }

        let rec = &self.records[i];
        let file_status = self.status_of(i);

        let (linked_status, payload, linkname) = match rec.typeflag {
            TYPE_HARDLINK => {
                let target = self.hardlink_for(i);
                let linked = if target == i {
                    file_status
                } else {
                    self.status_of(target)
                };
                let payload_rec = &self.records[target];
                (
                    linked,
                    Some((payload_rec.data_offset, payload_rec.size)),
                    rec.linkname.clone(),
                )
            }
            TYPE_SYMLINK => {
                let target = self.realpath(i);
                let linked = if target == self.records.len() {
                    Status::not_found()
                } else if target == i {
                    file_status
                } else {
                    self.status_of(target)
                };
                (linked, None, rec.linkname.clone())
            }
            _ if has_data(rec.typeflag) => {
                (file_status, Some((rec.data_offset, rec.size)), model::empty_path())
            }
            _ => (file_status, None, model::empty_path()),
        };

        Some(Box::new(TarEntry {
            filename: rec.name.clone(),
            file_status,
            linked_status,
            linkname,
            file: self.file.clone(),
            payload,
        }))
    }
}

struct TarEntry {
    filename: PathBuf,
    file_status: Status,
    linked_status: Status,
    linkname: PathBuf,
    file: Rc<RefCell<Box<dyn ReadSeek>>>,
    payload: Option<(u64, u64)>,
}

impl Entry for TarEntry {
    fn filename(&self) -> &Path {
        &self.filename
    }

    fn file_status(&self) -> Status {
        self.file_status
    }

    fn linked_status(&self) -> Status {
        self.linked_status
    }

    fn linkname(&self) -> &Path {
        &self.linkname
    }

    fn open(&self) -> Result<Box<dyn Read>> {
        match self.payload {
            Some((offset, size)) => Ok(Box::new(TarEntryReader {
                file: self.file.clone(),
                offset,
                size,
                pos: 0,
            })),
            None => Ok(Box::new(Cursor::new(Vec::new()))),
        }
    }
}

/// An entry's payload, re-seeking the archive's shared cursor before
/// every read (spec §5, the shared-cursor invariant).
struct TarEntryReader {
    file: Rc<RefCell<Box<dyn ReadSeek>>>,
    offset: u64,
    size: u64,
    pos: u64,
}

impl Read for TarEntryReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pos >= self.size {
            return Ok(0);
        }
        let want = ((self.size - self.pos) as usize).min(buf.len());
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(self.offset + self.pos))?;
        let n = file.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(mut v: Vec<u8>) -> Vec<u8> {
        while v.len() % 512 != 0 {
            v.push(0);
        }
        v
    }

    fn header(
        name: &str,
        typeflag: u8,
        size: u64,
        linkname: &str,
    ) -> [u8; 512] {
        let mut record = [0u8; 512];
        let name_bytes = name.as_bytes();
        record[0..name_bytes.len()].copy_from_slice(name_bytes);

        let mode = format!("{:07o}\0", 0o644);
        record[100..100 + mode.len()].copy_from_slice(mode.as_bytes());

        let size_field = format!("{:011o}\0", size);
        record[124..124 + size_field.len()].copy_from_slice(size_field.as_bytes());

        let mtime_field = format!("{:011o}\0", 0);
        record[136..136 + mtime_field.len()].copy_from_slice(mtime_field.as_bytes());

        record[156] = typeflag;

        let link_bytes = linkname.as_bytes();
        record[157..157 + link_bytes.len()].copy_from_slice(link_bytes);

        record[257..262].copy_from_slice(b"ustar");

        for b in record[148..156].iter_mut() {
            *b = b' ';
        }
        let (unsigned, _) = checksums(&record);
        let chksum_field = format!("{:06o}\0 ", unsigned);
        record[148..148 + chksum_field.len()].copy_from_slice(chksum_field.as_bytes());

        record
    }

    fn build(records: Vec<Vec<u8>>) -> Cursor<Vec<u8>> {
        let mut bytes = Vec::new();
        for r in records {
            bytes.extend_from_slice(&pad(r));
        }
        bytes.extend_from_slice(&[0u8; 1024]);
        Cursor::new(bytes)
    }

    #[test]
    fn single_regular_entry() {
        let mut data = header("hello.txt", b'0', 5, "").to_vec();
        data.extend_from_slice(b"hello");
        let cursor = build(vec![data]);

        let archive = TarArchive::open(Box::new(cursor)).unwrap();
        assert_eq!(archive.count(), 1);
        let entry = archive.entry(0).unwrap();
        assert_eq!(entry.filename(), Path::new("hello.txt"));
        let status = entry.file_status();
        assert_eq!(status.size, 5);
        assert_eq!(status.kind as u8, EntryType::Regular as u8);

        let mut out = Vec::new();
        entry.open().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn hardlink_reads_target_bytes() {
        let mut a = header("a", b'0', 3, "").to_vec();
        a.extend_from_slice(b"aaa");
        let b = header("b", b'1', 0, "a").to_vec();
        let cursor = build(vec![a, b]);

        let archive = TarArchive::open(Box::new(cursor)).unwrap();
        let entry = archive.entry(1).unwrap();
        assert!(entry.file_status().hardlink);
        let mut out = Vec::new();
        entry.open().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"aaa");
    }

    #[test]
    fn dangling_symlink_reports_not_found() {
        let link = header("link", b'2', 0, "target").to_vec();
        let cursor = build(vec![link]);

        let archive = TarArchive::open(Box::new(cursor)).unwrap();
        let entry = archive.entry(0).unwrap();
        assert_eq!(entry.linked_status().kind as u8, EntryType::NotFound as u8);
    }
}
