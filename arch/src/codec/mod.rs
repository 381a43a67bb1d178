//! Concrete decompression codecs and the compression-layer peel loop
//! (spec §4.2, §4.3, §4.5 step 1).

pub mod bzip2;
pub mod gzip;
pub mod xz;

use std::io::{Read, Seek, SeekFrom};

use crate::error::Result;
use crate::io::ReadSeek;

/// One compression-layer adapter: can this codec recognize the stream,
/// and can it wrap it in a decoding stream.
pub(crate) trait Codec {
    fn is_valid(&self, file: &mut dyn ReadSeek) -> std::io::Result<bool>;
    fn wrap(&self, file: Box<dyn ReadSeek>) -> Result<Box<dyn ReadSeek>>;
}

fn codecs() -> Vec<Box<dyn Codec>> {
    vec![
        Box::new(gzip::GzipCodec),
        Box::new(bzip2::Bzip2Codec),
        Box::new(xz::XzCodec),
    ]
}

/// Peel off zero or more compression layers, returning the innermost
/// decoded stream. Mirrors the original design's `archive::wrap()`.
pub fn peel(mut file: Box<dyn ReadSeek>) -> Result<Box<dyn ReadSeek>> {
    'outer: loop {
        for codec in codecs() {
            file.seek(SeekFrom::Start(0))?;
            if codec.is_valid(&mut *file)? {
                file.seek(SeekFrom::Start(0))?;
                file = codec.wrap(file)?;
                continue 'outer;
            }
        }
        return Ok(file);
    }
}

pub(crate) fn check_signature(file: &mut dyn ReadSeek, magic: &[u8]) -> std::io::Result<bool> {
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
