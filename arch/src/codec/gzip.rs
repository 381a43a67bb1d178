//! Gzip codec adapter and member-framing decoding stream (spec §4.4
//! "Gzip specialization").
//!
//! Grounded on `original_source/src/io/gzip.cc`: header flags
//! (FEXTRA/FNAME/FCOMMENT/FHCRC), the CRC32+ISIZE trailer check, and the
//! new-member restart on trailing non-NUL bytes.

use std::io::{Read, Seek, SeekFrom};

use flate2::Decompress as Inflate;
use flate2::FlushDecompress;

use crate::codec::{check_signature, Codec};
use crate::decoding::DecodedSeek;
use crate::error::Result;
use crate::io::ReadSeek;

const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

const FHCRC: u8 = 0x02;
const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;
const FCOMMENT: u8 = 0x10;

pub(crate) struct GzipCodec;

impl Codec for GzipCodec {
    fn is_valid(&self, file: &mut dyn ReadSeek) -> std::io::Result<bool> {
        check_signature(file, &GZIP_MAGIC)
    }

    fn wrap(&self, file: Box<dyn ReadSeek>) -> Result<Box<dyn ReadSeek>> {
        Ok(Box::new(GzipDecodingStream::new(file)))
    }
}

const RAW_BUF_SIZE: usize = 32 * 1024;

/// A seekable stream over the concatenation of every gzip member's
/// decoded payload.
pub struct GzipDecodingStream {
    file: Box<dyn ReadSeek>,
    inflate: Inflate,
    raw: Vec<u8>,
    putback: Vec<u8>,
    pos: u64,
    size: Option<u64>,
    eof: bool,
    new_member: bool,
    crc: crc32fast::Hasher,
    member_size: u32,
}

impl GzipDecodingStream {
    pub fn new(file: Box<dyn ReadSeek>) -> Self {
        GzipDecodingStream {
            file,
            inflate: Inflate::new(false),
            raw: vec![0u8; RAW_BUF_SIZE],
            putback: Vec::new(),
            pos: 0,
            size: None,
            eof: false,
            new_member: true,
            crc: crc32fast::Hasher::new(),
            member_size: 0,
        }
    }

    fn fill_raw(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if !self.putback.is_empty() {
            let n = self.putback.len().min(buf.len());
            buf[..n].copy_from_slice(&self.putback[..n]);
            self.putback.drain(..n);
            return Ok(n);
        }
        self.file.read(buf)
    }

    fn read_exact_raw(&mut self, buf: &mut [u8]) -> std::io::Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.fill_raw(&mut buf[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(false);
                }
                return Err(std::io::ErrorKind::UnexpectedEof.into());
            }
            filled += n;
        }
        Ok(true)
    }

    fn skip_asciiz(&mut self) -> std::io::Result<()> {
        let mut b = [0u8; 1];
        loop {
            if !self.read_exact_raw(&mut b)? {
                return Err(std::io::ErrorKind::UnexpectedEof.into());
            }
            if b[0] == 0 {
                return Ok(());
            }
        }
    }

    /// Reads a gzip member header. Returns `false` at a clean end of
    /// input (no more members), or at a malformed/truncated header:
    /// per the `Decompressor` contract, corrupt input surfaces as
    /// "nothing more to decode", not an error.
    fn read_gzip_header(&mut self) -> std::io::Result<bool> {
        let mut header = [0u8; 10];
        if !self.read_exact_raw(&mut header)? {
            return Ok(false);
        }
        if header[0..3] != GZIP_MAGIC {
            return Ok(false);
        }
        let flags = header[3];

        let fields = (|| -> std::io::Result<()> {
            if flags & FEXTRA != 0 {
                let mut len_buf = [0u8; 2];
                if !self.read_exact_raw(&mut len_buf)? {
                    return Err(std::io::ErrorKind::UnexpectedEof.into());
                }
                let len = u16::from_le_bytes(len_buf) as usize;
                let mut extra = vec![0u8; len];
                if !self.read_exact_raw(&mut extra)? {
                    return Err(std::io::ErrorKind::UnexpectedEof.into());
                }
            }
            if flags & FNAME != 0 {
                self.skip_asciiz()?;
            }
            if flags & FCOMMENT != 0 {
                self.skip_asciiz()?;
            }
            if flags & FHCRC != 0 {
                let mut crc16 = [0u8; 2];
                if !self.read_exact_raw(&mut crc16)? {
                    return Err(std::io::ErrorKind::UnexpectedEof.into());
                }
            }
            Ok(())
        })();

        if let Err(e) = fields {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                return Ok(false);
            }
            return Err(e);
        }

        self.inflate = Inflate::new(false);
        self.crc = crc32fast::Hasher::new();
        self.member_size = 0;
        self.new_member = false;
        Ok(true)
    }

    fn read_trailer_and_maybe_restart(&mut self) -> std::io::Result<()> {
        let mut trailer = [0u8; 8];
        if !self.read_exact_raw(&mut trailer)? {
            self.new_member = false;
            return Ok(());
        }
        let want_crc = u32::from_le_bytes(trailer[0..4].try_into().unwrap());
        let want_isize = u32::from_le_bytes(trailer[4..8].try_into().unwrap());
        let got_crc = self.crc.clone().finalize();
        if got_crc != want_crc || self.member_size != want_isize {
            // Trailer mismatch: corrupt stream, surfaced as no further
            // members rather than an error.
            self.new_member = false;
            return Ok(());
        }

        // Swallow trailing NUL padding, then decide whether a new member follows.
        loop {
            let mut b = [0u8; 1];
            let n = self.fill_raw(&mut b)?;
            if n == 0 {
                self.new_member = false;
                return Ok(());
            }
            if b[0] != 0 {
                self.putback.insert(0, b[0]);
                self.new_member = true;
                return Ok(());
            }
        }
    }
}

impl Read for GzipDecodingStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.new_member {
                if !self.read_gzip_header()? {
                    self.eof = true;
                    self.size = Some(self.pos);
                    return Ok(0);
                }
            }

            let mut raw = std::mem::take(&mut self.raw);
            let n = self.fill_raw(&mut raw)?;
            if n == 0 {
                self.raw = raw;
                self.eof = true;
                self.size = Some(self.pos);
                return Ok(0);
            }

            let before_in = self.inflate.total_in();
            let before_out = self.inflate.total_out();
            let result = self.inflate.decompress(&raw[..n], buf, FlushDecompress::None);
            self.raw = raw;

            let status = match result {
                Ok(status) => status,
                // Corrupt deflate stream: report no progress, not an
                // error. See the `Decompressor` trait doc comment.
                Err(_) => {
                    self.eof = true;
                    self.size = Some(self.pos);
                    return Ok(0);
                }
            };

            let consumed = (self.inflate.total_in() - before_in) as usize;
            let produced = (self.inflate.total_out() - before_out) as usize;

            if consumed < n {
                let mut tail = self.raw[consumed..n].to_vec();
                tail.extend_from_slice(&self.putback);
                self.putback = tail;
            }

            if produced > 0 {
                self.crc.update(&buf[..produced]);
                self.member_size = self.member_size.wrapping_add(produced as u32);
                self.pos += produced as u64;
                return Ok(produced);
            }

            if status == flate2::Status::StreamEnd {
                self.read_trailer_and_maybe_restart()?;
                continue;
            }

            if consumed == 0 {
                // No progress, no stream end: corrupt stream, surfaced
                // as EOF rather than an error.
                self.eof = true;
                self.size = Some(self.pos);
                return Ok(0);
            }
        }
    }
}

impl Seek for GzipDecodingStream {
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
            self.file.seek(SeekFrom::Start(0))?;
            self.putback.clear();
            self.pos = 0;
            self.eof = false;
            self.new_member = true;
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

impl DecodedSeek for GzipDecodingStream {
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
