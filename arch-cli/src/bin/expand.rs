//! Extracts archives into the current directory.
//!
//! Grounded on `original_source/src/unpacker.cc`'s `unpacker::unpack` /
//! `expand_file` / `make_directory` / `make_link` / `make_symlink`, and
//! on `rc-zip-cli/src/main.rs`'s `unzip`/`extract_entry` for the
//! idiomatic-Rust shape (`Result`-returning helpers, `?` propagation).

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use arch::{open, Archive, Entry, EntryType, OpenStatus, Status};
use cfg_if::cfg_if;
use clap::Parser;

#[derive(Parser)]
#[command(name = "expand", about = "Extract ZIP/TAR archives into the current directory")]
struct Cli {
    /// Archives to extract.
    archives: Vec<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if cli.archives.is_empty() {
        eprintln!("expand: missing archive operand");
        std::process::exit(1);
    }

    for path in &cli.archives {
        if let Err(e) = expand_one(path) {
            eprintln!("expand: {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn expand_one(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let file = arch::io::ArchFile::open(path)?;
    let (archive, status) = open(Box::new(file))?;

    let archive = match status {
        OpenStatus::Ok => archive.expect("Ok status always carries an archive"),
        OpenStatus::CompressionDamaged => return Err("file compression damaged".into()),
        OpenStatus::ArchiveDamaged => return Err("archive damaged".into()),
        OpenStatus::ArchiveUnknown => return Err("unrecognized archive".into()),
    };

    unpack(&*archive)
}

fn unpack(archive: &dyn Archive) -> Result<(), Box<dyn std::error::Error>> {
    for i in 0..archive.count() {
        let Some(entry) = archive.entry(i) else {
            continue;
        };
        expand_entry(&*entry)?;
    }
    Ok(())
}

fn expand_entry(entry: &dyn Entry) -> Result<(), Box<dyn std::error::Error>> {
    let status = entry.file_status();
    match status.kind {
        EntryType::Regular => expand_file(entry, status),
        EntryType::Directory => make_directory(entry, status),
        EntryType::Symlink if status.hardlink => make_link(entry, status),
        EntryType::Symlink => make_symlink(entry, status),
        _ => Ok(()),
    }
}

fn ensure_parent(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("{}: {e}", parent.display()))?;
        }
    }
    Ok(())
}

fn copy_attributes(path: &Path, status: &Status) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(status.perms));
    }
    if let Ok(file) = File::open(path) {
        let _ = file.set_modified(status.mtime);
    }
}

fn expand_file(entry: &dyn Entry, status: Status) -> Result<(), Box<dyn std::error::Error>> {
    let name = entry.filename();
    if name.as_os_str().is_empty() {
        return Ok(());
    }

    ensure_parent(name)?;

    let mut src = entry.open()?;
    let result = (|| -> io::Result<()> {
        let mut dst = File::create(name)?;
        io::copy(&mut src, &mut dst)?;
        dst.flush()
    })();

    match result {
        Ok(()) => {
            copy_attributes(name, &status);
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(name);
            Err(format!("cannot extract file: {e}").into())
        }
    }
}

fn make_directory(entry: &dyn Entry, status: Status) -> Result<(), Box<dyn std::error::Error>> {
    let name = entry.filename();
    if name.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(name).map_err(|e| format!("{e}"))?;
    copy_attributes(name, &status);
    Ok(())
}

fn make_link(entry: &dyn Entry, status: Status) -> Result<(), Box<dyn std::error::Error>> {
    let name = entry.filename();
    if name.as_os_str().is_empty() {
        return Ok(());
    }
    let linkname = entry.linkname();

    ensure_parent(name)?;

    fs::hard_link(linkname, name).map_err(|e| {
        format!("{e}\n  note: while making hard link to: {}", linkname.display())
    })?;

    copy_attributes(name, &status);
    Ok(())
}

fn make_symlink(entry: &dyn Entry, status: Status) -> Result<(), Box<dyn std::error::Error>> {
    let name = entry.filename();
    if name.as_os_str().is_empty() {
        return Ok(());
    }
    let linked_type = entry.linked_status().kind;
    let linkname = entry.linkname();

    ensure_parent(name)?;

    let result = symlink(linkname, name, linked_type == EntryType::Directory);
    result.map_err(|e| {
        format!("{e}\n  note: while making symlink to: {}", linkname.display())
    })?;

    copy_attributes(name, &status);
    Ok(())
}

fn symlink(target: &Path, link: &Path, target_is_dir: bool) -> io::Result<()> {
    cfg_if! {
        if #[cfg(unix)] {
            let _ = target_is_dir;
            std::os::unix::fs::symlink(target, link)
        } else if #[cfg(windows)] {
            if target_is_dir {
                std::os::windows::fs::symlink_dir(target, link)
            } else {
                std::os::windows::fs::symlink_file(target, link)
            }
        } else {
            let _ = (target, link, target_is_dir);
            Err(io::Error::new(io::ErrorKind::Unsupported, "symlinks not supported on this platform"))
        }
    }
}
