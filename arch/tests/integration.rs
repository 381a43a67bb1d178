//! End-to-end tests building synthetic archives in memory, mirroring
//! the scenarios this crate's design is checked against.

use std::io::{Cursor, Read, Write};

use arch::{open, Archive, Entry, EntryType, OpenStatus};

fn tar_header(name: &str, typeflag: u8, size: u64, linkname: &str) -> [u8; 512] {
    let mut record = [0u8; 512];
    let name_bytes = name.as_bytes();
    record[0..name_bytes.len()].copy_from_slice(name_bytes);

    let mode = format!("{:07o}\0", 0o644);
    record[100..100 + mode.len()].copy_from_slice(mode.as_bytes());

    let size_field = format!("{:011o}\0", size);
    record[124..124 + size_field.len()].copy_from_slice(size_field.as_bytes());

    let mtime_field = format!("{:011o}\0", 0);
    record[136..136 + mtime_field.len()].copy_from_slice(mtime_field.as_bytes());

    record[156] = typeflag;

    let link_bytes = linkname.as_bytes();
    record[157..157 + link_bytes.len()].copy_from_slice(link_bytes);

    record[257..262].copy_from_slice(b"ustar");

    for b in record[148..156].iter_mut() {
        *b = b' ';
    }
    let mut unsigned: i64 = 0;
    for (i, &b) in record.iter().enumerate() {
        let byte = if (148..156).contains(&i) { b' ' } else { b };
        unsigned += byte as i64;
    }
    let chksum_field = format!("{:06o}\0 ", unsigned);
    record[148..148 + chksum_field.len()].copy_from_slice(chksum_field.as_bytes());

    record
}

fn pad_to_record(mut v: Vec<u8>) -> Vec<u8> {
    while v.len() % 512 != 0 {
        v.push(0);
    }
    v
}

fn single_file_tar(name: &str, contents: &[u8]) -> Vec<u8> {
    let mut entry = tar_header(name, b'0', contents.len() as u64, "").to_vec();
    entry.extend_from_slice(contents);
    let mut bytes = pad_to_record(entry);
    bytes.extend_from_slice(&[0u8; 1024]);
    bytes
}

#[test]
fn plain_tar_round_trip() {
    let bytes = single_file_tar("hello.txt", b"hello");
    let (archive, status) = open(Box::new(Cursor::new(bytes))).unwrap();
    assert_eq!(status, OpenStatus::Ok);
    let archive = archive.unwrap();
    assert_eq!(archive.count(), 1);
    let entry = archive.entry(0).unwrap();
    assert_eq!(entry.file_status().kind as u8, EntryType::Regular as u8);
    let mut out = Vec::new();
    entry.open().unwrap().read_to_end(&mut out).unwrap();
    assert_eq!(out, b"hello");
}

#[test]
fn gzip_wrapped_tar_round_trip() {
    let tar_bytes = single_file_tar("hello.txt", b"hello");

    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    let gz_bytes = encoder.finish().unwrap();

    let (archive, status) = open(Box::new(Cursor::new(gz_bytes))).unwrap();
    assert_eq!(status, OpenStatus::Ok);
    let archive = archive.unwrap();
    assert_eq!(archive.count(), 1);
    let entry = archive.entry(0).unwrap();
    let mut out = Vec::new();
    entry.open().unwrap().read_to_end(&mut out).unwrap();
    assert_eq!(out, b"hello");
}

#[test]
fn concatenated_gzip_members_decode_to_concatenated_payload() {
    let mut first = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    first.write_all(b"hello, ").unwrap();
    let mut bytes = first.finish().unwrap();

    let mut second = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    second.write_all(b"world!").unwrap();
    bytes.extend_from_slice(&second.finish().unwrap());

    let mut stream = arch::codec::gzip::GzipDecodingStream::new(Box::new(Cursor::new(bytes)));
    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"hello, world!");
}

#[test]
fn empty_input_is_archive_unknown() {
    let (archive, status) = open(Box::new(Cursor::new(Vec::new()))).unwrap();
    assert!(archive.is_none());
    assert_eq!(status, OpenStatus::ArchiveUnknown);
}

fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Hand-assembled single-entry, Stored-method ZIP file, so this test
/// doesn't depend on the exact shape of the `zip` crate's writer API.
fn single_file_zip(name: &str, contents: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let local_header_offset = 0u32;

    // Local file header.
    out.extend_from_slice(&0x04034b50u32.to_le_bytes());
    out.extend_from_slice(&20u16.to_le_bytes()); // version needed
    out.extend_from_slice(&0u16.to_le_bytes()); // flags
    out.extend_from_slice(&0u16.to_le_bytes()); // method: stored
    out.extend_from_slice(&0u16.to_le_bytes()); // mod time
    out.extend_from_slice(&0u16.to_le_bytes()); // mod date
    out.extend_from_slice(&crc32(contents).to_le_bytes());
    out.extend_from_slice(&(contents.len() as u32).to_le_bytes()); // compressed size
    out.extend_from_slice(&(contents.len() as u32).to_le_bytes()); // uncompressed size
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // extra len
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(contents);

    let central_dir_offset = out.len() as u32;

    // Central directory file header.
    out.extend_from_slice(&0x02014b50u32.to_le_bytes());
    out.extend_from_slice(&20u16.to_le_bytes()); // version made by
    out.extend_from_slice(&20u16.to_le_bytes()); // version needed
    out.extend_from_slice(&0u16.to_le_bytes()); // flags
    out.extend_from_slice(&0u16.to_le_bytes()); // method
    out.extend_from_slice(&0u16.to_le_bytes()); // mod time
    out.extend_from_slice(&0u16.to_le_bytes()); // mod date
    out.extend_from_slice(&crc32(contents).to_le_bytes());
    out.extend_from_slice(&(contents.len() as u32).to_le_bytes());
    out.extend_from_slice(&(contents.len() as u32).to_le_bytes());
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // extra len
    out.extend_from_slice(&0u16.to_le_bytes()); // comment len
    out.extend_from_slice(&0u16.to_le_bytes()); // disk number start
    out.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
    out.extend_from_slice(&((0o100644u32) << 16).to_le_bytes()); // external attrs
    out.extend_from_slice(&local_header_offset.to_le_bytes());
    out.extend_from_slice(name.as_bytes());

    let central_dir_size = out.len() as u32 - central_dir_offset;

    // End of central directory record.
    out.extend_from_slice(&0x06054b50u32.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // disk number
    out.extend_from_slice(&0u16.to_le_bytes()); // disk with central dir
    out.extend_from_slice(&1u16.to_le_bytes()); // entries on this disk
    out.extend_from_slice(&1u16.to_le_bytes()); // total entries
    out.extend_from_slice(&central_dir_size.to_le_bytes());
    out.extend_from_slice(&central_dir_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // comment len

    out
}

#[test]
fn zip_round_trip() {
    let bytes = single_file_zip("greeting.txt", b"hello zip");
    let (archive, status) = open(Box::new(Cursor::new(bytes))).unwrap();
    assert_eq!(status, OpenStatus::Ok);
    let archive = archive.unwrap();
    assert_eq!(archive.count(), 1);
    let entry = archive.entry(0).unwrap();
    assert_eq!(entry.filename().to_str().unwrap(), "greeting.txt");
    assert_eq!(entry.file_status().kind as u8, EntryType::Regular as u8);
    let mut out = Vec::new();
    entry.open().unwrap().read_to_end(&mut out).unwrap();
    assert_eq!(out, b"hello zip");
}
