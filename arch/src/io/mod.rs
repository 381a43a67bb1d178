//! The seekable byte-source abstraction (spec §4.1).

mod file;

pub use file::ArchFile;

use std::io::{Read, Seek};

/// Anything that can be both read and seeked.
///
/// This is the Rust stand-in for the original design's custom `seekable`
/// interface: `std::io::{Read, Seek}` already give us everything that
/// interface specified, so this trait exists only to name the
/// combination as a single trait object (`Box<dyn ReadSeek>`).
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}
