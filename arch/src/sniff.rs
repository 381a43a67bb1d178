//! Format detection and dispatch (spec §4.5).

use std::io::{Read, Seek, SeekFrom};

use tracing::debug;

use crate::codec::peel;
use crate::error::Result;
use crate::io::ReadSeek;
use crate::model::Archive;
use crate::tar::TarArchive;
use crate::zip::ZipArchiveAdapter;

/// Outcome of [`open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenStatus {
    /// An archive was found and parsed successfully.
    Ok,
    /// A compression layer was recognized but failed to decode.
    CompressionDamaged,
    /// An archive format was recognized but its contents are invalid.
    ArchiveDamaged,
    /// No known archive format was recognized.
    ArchiveUnknown,
}

/// Sniff `file`, peel any compression layers, and dispatch to an
/// archive reader.
///
/// Returns `(archive, status)`; `archive` is `Some` only when `status`
/// is [`OpenStatus::Ok`].
pub fn open(file: Box<dyn ReadSeek>) -> Result<(Option<Box<dyn Archive>>, OpenStatus)> {
    let mut file = match peel(file) {
        Ok(f) => f,
        Err(_) => return Ok((None, OpenStatus::CompressionDamaged)),
    };

    file.seek(SeekFrom::Start(0))?;
    if ZipArchiveAdapter::is_valid(&mut *file)? {
        file.seek(SeekFrom::Start(0))?;
        return match ZipArchiveAdapter::open(file) {
            Ok(archive) => {
                debug!("opened zip archive");
                Ok((Some(Box::new(archive)), OpenStatus::Ok))
            }
            Err(_) => Ok((None, OpenStatus::ArchiveDamaged)),
        };
    }

    file.seek(SeekFrom::Start(0))?;
    if TarArchive::is_valid(&mut *file)? {
        file.seek(SeekFrom::Start(0))?;
        return match TarArchive::open(file) {
            Ok(archive) => {
                debug!("opened tar archive");
                Ok((Some(Box::new(archive)), OpenStatus::Ok))
            }
            Err(_) => Ok((None, OpenStatus::ArchiveDamaged)),
        };
    }

    Ok((None, OpenStatus::ArchiveUnknown))
}

pub(crate) fn peek_magic(file: &mut dyn ReadSeek, magic: &[u8]) -> std::io::Result<bool> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = vec![0u8; magic.len()];
    let matched = match file.read_exact(&mut buf) {
        Ok(()) => buf == magic,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(e),
    };
    file.seek(SeekFrom::Start(0))?;
    Ok(matched)
}
