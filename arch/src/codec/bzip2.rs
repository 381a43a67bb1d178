//! Bzip2 codec adapter (spec §4.3).

use bzip2::Decompress as Bz;

use crate::codec::{check_signature, Codec};
use crate::decoding::{Decompressor, PlainDecodingStream};
use crate::error::Result;
use crate::io::ReadSeek;

const BZIP2_MAGIC: [u8; 3] = *b"BZh";

pub(crate) struct Bzip2Codec;

impl Codec for Bzip2Codec {
    fn is_valid(&self, file: &mut dyn ReadSeek) -> std::io::Result<bool> {
        check_signature(file, &BZIP2_MAGIC)
    }

    fn wrap(&self, file: Box<dyn ReadSeek>) -> Result<Box<dyn ReadSeek>> {
        Ok(Box::new(PlainDecodingStream::new(
            file,
            Box::new(|| Box::new(Bzip2Decompressor::new()) as Box<dyn Decompressor>),
        )))
    }
}

struct Bzip2Decompressor {
    inner: Bz,
    finished: bool,
}

impl Bzip2Decompressor {
    fn new() -> Self {
        Bzip2Decompressor {
            inner: Bz::new(false),
            finished: false,
        }
    }
}

impl Decompressor for Bzip2Decompressor {
    fn eof(&self) -> bool {
        self.finished
    }

    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize)> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let status = match self.inner.decompress(input, output) {
            Ok(status) => status,
            // Corrupt input: report no progress, not an error. See
            // the `Decompressor` trait doc comment.
            Err(_) => return Ok((0, 0)),
        };
        self.finished = status == bzip2::Status::StreamEnd;
        Ok((
            (self.inner.total_out() - before_out) as usize,
            (self.inner.total_in() - before_in) as usize,
        ))
    }
}
