//! Lists archive contents, `ls -l`-style, grouped by directory.
//!
//! Grounded on `original_source/examples/list/main.cc`'s `unpack`
//! loop and `dirnode::minimize()`/`print()` sequence.

use std::io;
use std::path::PathBuf;

use arch::OpenStatus;
use arch_cli::colors::Painter;
use arch_cli::dirent::DirNode;
use clap::Parser;

#[derive(Parser)]
#[command(name = "list", about = "List ZIP/TAR archive contents")]
struct Cli {
    /// Archives to list.
    archives: Vec<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if cli.archives.is_empty() {
        eprintln!("list <arch> [<arch> ...]");
        std::process::exit(1);
    }

    let mut root = DirNode::default();

    for path in &cli.archives {
        if let Err(e) = unpack(path, &mut root) {
            eprintln!("list: {}: {e}", path.display());
            std::process::exit(1);
        }
    }

    root.minimize();

    let painter = Painter::from_env();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = root.print(&mut out, &painter, std::time::SystemTime::now()) {
        eprintln!("list: {e}");
        std::process::exit(1);
    }
}

fn unpack(path: &std::path::Path, root: &mut DirNode) -> Result<(), Box<dyn std::error::Error>> {
    let file = arch::io::ArchFile::open(path)?;
    let (archive, status) = arch::open(Box::new(file))?;

    let archive = match status {
        OpenStatus::Ok => archive.expect("Ok status always carries an archive"),
        OpenStatus::CompressionDamaged => return Err("file compression damaged".into()),
        OpenStatus::ArchiveDamaged => return Err("archive damaged".into()),
        OpenStatus::ArchiveUnknown => return Err("unrecognized archive".into()),
    };

    root.append_archive(&*archive);
    Ok(())
}
