#![warn(missing_docs)]

//! `arch` reads archives: ZIP, and TAR optionally wrapped in one or more
//! streaming compressors (gzip, bzip2, xz).
//!
//! The entry point is [`open`], which sniffs a seekable byte source,
//! peels off any compression layers, and returns a boxed [`Archive`]
//! together with an [`OpenStatus`] describing how the detection went.
//!
//! This crate only reads archives; it does not write them, and it only
//! works against sources that implement [`std::io::Seek`].

pub mod codec;
pub mod decoding;
pub mod error;
pub mod io;
pub mod model;
pub mod sniff;
pub mod tar;
pub mod zip;

pub use error::{Error, Result};
pub use model::{Archive, Entry, EntryType, Status};
pub use sniff::{open, OpenStatus};
