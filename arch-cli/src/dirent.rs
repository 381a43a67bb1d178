//! Directory-grouped, minimized archive listing.
//!
//! Grounded on `original_source/examples/list/dirent.cc`: the same
//! `dirnode` tree keyed by path segment, the same `minimize()` pass
//! that folds single-child directories into their parent's listing,
//! and the same `ls -l`-flavored per-entry line.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use std::time::SystemTime;

use arch::{Archive, Entry, EntryType, Status};
use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::colors::{LsType, Painter};

/// Everything `printdir` needs about one filename in a directory.
#[derive(Debug, Clone)]
pub struct FileInfo {
    status: Status,
    symlink_type: EntryType,
    symlink_perms: u32,
    linkname: String,
    symlink_size: u64,
}

/// One directory's worth of entries, plus its subdirectories.
#[derive(Default)]
pub struct DirNode {
    entries: BTreeMap<String, FileInfo>,
    subnodes: BTreeMap<String, DirNode>,
}

fn split_path(path: &Path) -> (std::path::PathBuf, String) {
    let mut dirname = path.parent().map(|p| p.to_path_buf()).unwrap_or_default();
    let mut filename = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty());

    if filename.is_none() {
        if let Some(dir_name) = dirname.file_name() {
            filename = Some(dir_name.to_string_lossy().into_owned());
            dirname = dirname.parent().map(|p| p.to_path_buf()).unwrap_or_default();
        }
    }

    (dirname, filename.unwrap_or_default())
}

impl DirNode {
    /// Append every entry of `archive` into this tree.
    pub fn append_archive(&mut self, archive: &dyn Archive) {
        for i in 0..archive.count() {
            if let Some(entry) = archive.entry(i) {
                self.append_entry(&*entry);
            }
        }
    }

    fn append_entry(&mut self, entry: &dyn Entry) {
        let (dirname, filename) = split_path(entry.filename());

        let status = entry.file_status();
        let mut info = FileInfo {
            status,
            symlink_type: EntryType::None,
            symlink_perms: 0,
            linkname: String::new(),
            symlink_size: 0,
        };
        if status.kind == EntryType::Symlink {
            let linked = entry.linked_status();
            info.symlink_type = linked.kind;
            info.symlink_perms = linked.perms;
            info.symlink_size = linked.size;
            info.linkname = entry.linkname().to_string_lossy().into_owned();
        }

        let dir = self.navigate(&dirname);
        dir.entries.insert(filename, info);
    }

    fn navigate(&mut self, dirname: &Path) -> &mut DirNode {
        let mut node = self;
        for seg in dirname.components() {
            let std::path::Component::Normal(seg) = seg else {
                continue;
            };
            let key = seg.to_string_lossy().into_owned();
            node = node.subnodes.entry(key).or_default();
        }
        node
    }

    /// Fold directories with fewer than two total children into their
    /// parent's listing, the way the original tool collapses
    /// single-file subtrees.
    pub fn minimize(&mut self) {
        for dir in self.subnodes.values_mut() {
            dir.minimize();
        }

        let fold: Vec<String> = self
            .subnodes
            .iter()
            .filter(|(_, dir)| dir.entries.len() + dir.subnodes.len() < 2)
            .map(|(name, _)| name.clone())
            .collect();

        let mut additional_subnodes = BTreeMap::new();
        for name in &fold {
            let Some(dir) = self.subnodes.remove(name) else {
                continue;
            };
            let prefix = format!("{name}/");
            for (file, info) in dir.entries {
                self.entries.insert(format!("{prefix}{file}"), info);
            }
            for (file, sub) in dir.subnodes {
                additional_subnodes.insert(format!("{prefix}{file}"), sub);
            }
        }
        self.subnodes.extend(additional_subnodes);
    }

    /// Print this tree, depth-first, one blank-line-separated group
    /// per non-empty directory.
    pub fn print(&self, out: &mut impl Write, painter: &Painter, now: SystemTime) -> io::Result<()> {
        let mut first = true;
        self.print_inner(out, painter, now, &mut first, "")
    }

    fn print_inner(
        &self,
        out: &mut impl Write,
        painter: &Painter,
        now: SystemTime,
        first: &mut bool,
        prefix: &str,
    ) -> io::Result<()> {
        if !self.entries.is_empty() || !self.subnodes.is_empty() {
            let was_first = *first;
            if !*first {
                writeln!(out)?;
            }
            *first = false;
            if prefix.is_empty() {
                if !was_first {
                    writeln!(out, "<root>:")?;
                }
            } else {
                writeln!(out, "{prefix}:")?;
            }

            let mut merged = self.entries.clone();
            for name in self.subnodes.keys() {
                merged.insert(
                    name.clone(),
                    FileInfo {
                        status: Status {
                            size: 0,
                            mtime: now,
                            kind: EntryType::Directory,
                            perms: 0o755,
                            hardlink: false,
                        },
                        symlink_type: EntryType::None,
                        symlink_perms: 0,
                        linkname: String::new(),
                        symlink_size: 0,
                    },
                );
            }
            printdir(&merged, painter, out)?;
        }

        for (name, dir) in &self.subnodes {
            let pre = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            dir.print_inner(out, painter, now, first, &pre)?;
        }
        Ok(())
    }
}

fn size_from(info: &FileInfo) -> u64 {
    if info.status.kind == EntryType::Symlink {
        if info.status.hardlink {
            info.symlink_size
        } else {
            info.linkname.len() as u64
        }
    } else {
        info.status.size
    }
}

fn human_readable(size: u64) -> String {
    if size < 1024 {
        return size.to_string();
    }
    // The first entry is a placeholder that's never actually printed:
    // any size reaching this branch is already >= 1024, so the
    // threshold check below never accepts a suffix-less result here.
    // It exists only so the loop consumes one iteration before 'k',
    // matching the fixed-point arithmetic below.
    const POWERS: [char; 9] = ['_', 'k', 'M', 'G', 'T', 'P', 'E', 'Z', 'Y'];
    let mut scaled = (size as u128) * 10;
    for &power in POWERS.iter() {
        scaled += 5;
        if scaled < 10245 {
            return format!("{}{}", scaled / 10, power);
        }
        scaled /= 1024;
    }
    format!("{}{}", scaled / 10, POWERS[POWERS.len() - 1])
}

fn type_to_char(kind: EntryType) -> char {
    match kind {
        EntryType::None => 'n',
        EntryType::NotFound => '*',
        EntryType::Regular => '-',
        EntryType::Directory => 'd',
        EntryType::Symlink => 'l',
        EntryType::Block => 'b',
        EntryType::Character => 'c',
        EntryType::Fifo => 'p',
        EntryType::Socket => 's',
        EntryType::Unknown => '?',
    }
}

fn write_rwx(out: &mut impl Write, perms: u32) -> io::Result<()> {
    for shift in [6, 3, 0] {
        let bits = (perms >> shift) & 0o7;
        write!(
            out,
            "{}{}{}",
            if bits & 4 == 4 { 'r' } else { '-' },
            if bits & 2 == 2 { 'w' } else { '-' },
            if bits & 1 == 1 { 'x' } else { '-' },
        )?;
    }
    Ok(())
}

fn write_time(out: &mut impl Write, mtime: SystemTime, now: SystemTime) -> io::Result<()> {
    let dt: DateTime<Utc> = mtime.into();
    let now_dt: DateTime<Utc> = now.into();

    const HALF_YEAR_SECS: i64 = 31_556_952 / 2;
    let recent = (now_dt.timestamp() - dt.timestamp()) <= HALF_YEAR_SECS && dt <= now_dt;

    if recent {
        write!(
            out,
            "{} {:2} {:02}:{:02}",
            month_abbrev(dt.month0()),
            dt.day(),
            dt.hour(),
            dt.minute()
        )
    } else {
        write!(out, "{} {:2}  {}", month_abbrev(dt.month0()), dt.day(), dt.year())
    }
}

fn month_abbrev(month0: u32) -> &'static str {
    const NAMES: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    NAMES[(month0 as usize).min(11)]
}

/// Print one directory's entries, `ls -l`-style, colored per
/// `painter`.
pub fn printdir(
    entries: &BTreeMap<String, FileInfo>,
    painter: &Painter,
    out: &mut impl Write,
) -> io::Result<()> {
    let size_width = entries
        .values()
        .map(|info| human_readable(size_from(info)).chars().count())
        .max()
        .unwrap_or(0);

    let now = SystemTime::now();

    for (name, info) in entries {
        write!(out, "{}", type_to_char(info.status.kind))?;
        write_rwx(out, info.status.perms)?;
        write!(out, " ")?;

        let size_str = human_readable(size_from(info));
        for _ in size_str.chars().count()..size_width {
            write!(out, " ")?;
        }
        write!(out, "{size_str} ")?;
        write_time(out, info.status.mtime, now)?;
        write!(out, " ")?;

        if info.status.kind == EntryType::Symlink && info.symlink_type == EntryType::NotFound {
            write!(out, "{}", painter.paint_ls(name, LsType::Orphan, info.status.perms))?;
        } else if info.status.kind == EntryType::Symlink && info.status.hardlink {
            write!(out, "{}", painter.paint_ls(name, LsType::Regular, info.status.perms))?;
        } else {
            write!(out, "{}", painter.paint(name, info.status.kind, info.status.perms))?;
        }

        if info.status.kind == EntryType::Symlink {
            if info.status.hardlink {
                write!(out, " [{}]", info.linkname)?;
            } else {
                let symtype = if info.symlink_type == EntryType::NotFound {
                    LsType::Orphan
                } else {
                    info.symlink_type.into()
                };
                write!(
                    out,
                    " -> {}",
                    painter.paint_ls(&info.linkname, symtype, info.symlink_perms)
                )?;
            }
        }

        writeln!(out)?;
    }
    Ok(())
}
