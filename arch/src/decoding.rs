//! The decoding stream (spec §4.4): turns a compressed seekable source
//! into a seekable source of decoded bytes.

use std::io::{Read, Seek, SeekFrom};

use crate::error::Result;
use crate::io::ReadSeek;

/// An incremental, push-based decompressor.
///
/// Grounded on the shape shared by `flate2::Decompress::decompress`,
/// `bzip2::Decompress::decompress`, and `xz2::stream::Stream::process`:
/// feed some input, get some output, and track how much of each was
/// consumed/produced. One trait captures all three codec adapters.
pub trait Decompressor {
    /// Whether the underlying compressed stream has been fully decoded.
    fn eof(&self) -> bool;

    /// Feed `input`, fill as much of `output` as possible.
    ///
    /// Returns `(produced, consumed)`. May return `(0, 0)` only at
    /// end-of-stream or input starvation. Unconsumed input bytes remain
    /// the caller's responsibility to re-feed.
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize)>;
}

/// Extra seek operations every decoding stream supports, on top of
/// `std::io::Seek`.
pub trait DecodedSeek: Seek {
    /// Seek to the end, returning the total decoded size.
    fn seek_to_end(&mut self) -> std::io::Result<u64> {
        self.seek(SeekFrom::End(0))
    }
}

const RAW_BUF_SIZE: usize = 64 * 1024;

/// A decoding stream for codecs with no member framing of their own
/// (bzip2, xz). Gzip needs its own [`crate::codec::gzip::GzipDecodingStream`]
/// because a new gzip member requires a fresh low-level decompressor
/// *and* a fresh header to parse; for bzip2/xz the member boundary (if
/// any) is entirely the decompressor's concern.
pub struct PlainDecodingStream {
    file: Box<dyn ReadSeek>,
    make_decompressor: Box<dyn Fn() -> Box<dyn Decompressor>>,
    decompressor: Box<dyn Decompressor>,
    raw: Vec<u8>,
    putback: Vec<u8>,
    pos: u64,
    size: Option<u64>,
    eof: bool,
}

impl PlainDecodingStream {
    /// Wrap `file` (positioned at the start of the compressed data),
    /// using `make_decompressor` to construct (and later reconstruct,
    /// see below) the low-level decompressor.
    pub fn new(
        file: Box<dyn ReadSeek>,
        make_decompressor: Box<dyn Fn() -> Box<dyn Decompressor>>,
    ) -> Self {
        let decompressor = make_decompressor();
        PlainDecodingStream {
            file,
            make_decompressor,
            decompressor,
            raw: vec![0u8; RAW_BUF_SIZE],
            putback: Vec::new(),
            pos: 0,
            size: None,
            eof: false,
        }
    }

    fn rewind(&mut self) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.putback.clear();
        self.decompressor = (self.make_decompressor)();
        self.pos = 0;
        self.eof = false;
        Ok(())
    }

    /// Read a raw chunk: drain the putback buffer first, else read fresh
    /// bytes from the underlying file.
    fn read_lowlevel(&mut self) -> std::io::Result<usize> {
        if !self.putback.is_empty() {
            let n = self.putback.len().min(self.raw.len());
            self.raw[..n].copy_from_slice(&self.putback[..n]);
            self.putback.drain(..n);
            return Ok(n);
        }
        self.file.read(&mut self.raw)
    }
}

impl Read for PlainDecodingStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.decompressor.eof() {
                // Try to start a fresh member if more raw data remains.
                let n = self.read_lowlevel()?;
                if n == 0 {
                    self.eof = true;
                    self.size = Some(self.pos);
                    return Ok(0);
                }
                self.decompressor = (self.make_decompressor)();
                self.putback.extend_from_slice(&self.raw[..n]);
            }

            let n = self.read_lowlevel()?;
            if n == 0 {
                self.eof = true;
                self.size = Some(self.pos);
                return Ok(0);
            }

            let (produced, consumed) = self
                .decompressor
                .decompress(&self.raw[..n], buf)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

            if consumed < n {
                let mut tail = self.raw[consumed..n].to_vec();
                tail.extend_from_slice(&self.putback);
                self.putback = tail;
            }

            if produced > 0 {
                self.pos += produced as u64;
                return Ok(produced);
            }

            if consumed == 0 {
                // No progress at all: corrupt stream.
                self.eof = true;
                self.size = Some(self.pos);
                return Ok(0);
            }
        }
    }
}

impl Seek for PlainDecodingStream {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => p,
            SeekFrom::Current(delta) => (self.pos as i64 + delta) as u64,
            SeekFrom::End(delta) => {
                let end = self.seek_to_end()?;
                (end as i64 + delta) as u64
            }
        };

        if target == self.pos {
            return Ok(self.pos);
        }
        if target < self.pos {
            self.rewind()?;
        }

        let mut sink = [0u8; 8192];
        while self.pos < target {
            let want = (target - self.pos).min(sink.len() as u64) as usize;
            let n = self.read(&mut sink[..want])?;
            if n == 0 {
                break;
            }
        }
        Ok(self.pos)
    }
}

impl DecodedSeek for PlainDecodingStream {
    fn seek_to_end(&mut self) -> std::io::Result<u64> {
        if let Some(size) = self.size {
            self.seek(SeekFrom::Start(size))?;
            return Ok(size);
        }
        let mut sink = [0u8; 64 * 1024];
        loop {
            let n = self.read(&mut sink)?;
            if n == 0 {
                break;
            }
        }
        Ok(self.pos)
    }
}
