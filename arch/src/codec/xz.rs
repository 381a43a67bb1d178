//! Xz codec adapter (spec §4.3).
//!
//! Uses `xz2::stream::Stream` rather than the teacher's `lzma-rs`: see
//! `DESIGN.md` for why (`lzma-rs` only exposes a raw/legacy-LZMA stream
//! decoder, not an incremental decoder for the `.xz` container format).

use xz2::stream::{Action, Status as XzStatus, Stream};

use crate::codec::{check_signature, Codec};
use crate::decoding::{Decompressor, PlainDecodingStream};
use crate::error::Result;
use crate::io::ReadSeek;

const XZ_MAGIC: [u8; 6] = [0xFD, b'7', b'z', b'X', b'Z', 0x00];

const MEM_LIMIT: u64 = u64::MAX;

pub(crate) struct XzCodec;

impl Codec for XzCodec {
    fn is_valid(&self, file: &mut dyn ReadSeek) -> std::io::Result<bool> {
        check_signature(file, &XZ_MAGIC)
    }

    fn wrap(&self, file: Box<dyn ReadSeek>) -> Result<Box<dyn ReadSeek>> {
        Ok(Box::new(PlainDecodingStream::new(
            file,
            Box::new(|| Box::new(XzDecompressor::new()) as Box<dyn Decompressor>),
        )))
    }
}

struct XzDecompressor {
    inner: Stream,
    finished: bool,
}

impl XzDecompressor {
    fn new() -> Self {
        XzDecompressor {
            inner: Stream::new_stream_decoder(MEM_LIMIT, 0)
                .expect("libzma stream decoder init"),
            finished: false,
        }
    }
}

impl Decompressor for XzDecompressor {
    fn eof(&self) -> bool {
        self.finished
    }

    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize)> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let status = match self.inner.process(input, output, Action::Run) {
            Ok(status) => status,
            // Corrupt input: report no progress, not an error. See
            // the `Decompressor` trait doc comment.
            Err(_) => return Ok((0, 0)),
        };
        self.finished = status == XzStatus::StreamEnd;
        Ok((
            (self.inner.total_out() - before_out) as usize,
            (self.inner.total_in() - before_in) as usize,
        ))
    }
}
