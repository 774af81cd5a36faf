//! From-scratch archive re-serialization with alignment control.
//!
//! Appending to a ZIP in place cannot guarantee alignment: updating one entry
//! shifts the offset of every subsequent entry, and a resource table that was
//! 4-byte aligned before the update may not be afterwards — which the host
//! runtime rejects at install time. The only reliable fix is to rewrite the
//! whole container, choosing each entry's compression and padding explicitly.
//!
//! Alignment formula, per STORE entry:
//!
//! ```text
//! base_data_offset = archive_position + 30 + len(filename)
//! pad              = (alignment - base_data_offset % alignment) % alignment
//! extra_field      = pad zero bytes in the local file header
//! ```
//!
//! After writing each local header the writer re-derives the data offset and
//! refuses to continue if the invariant does not hold — a correctness guard,
//! not an optimization.
//!
//! Entries are read through the `zip` crate; the output records (local file
//! headers, central directory, end record) are written by hand because
//! padding control is the whole point.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use flate2::{write::DeflateEncoder, Compression};
use log::{debug, info};
use zip::{CompressionMethod, ZipArchive};

use crate::{
    archive::entry::{must_store, ArchiveEntry, CompressionKind, EntryReport},
    error::ArchiveError,
    file::File,
};

/// The alignment unit the host runtime mandates for must-store entries.
pub const ALIGNMENT: u64 = 4;

const LOCAL_HEADER_LEN: u64 = 30;
const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const END_RECORD_SIG: u32 = 0x0605_4b50;

/// Offset of the filename-length field inside a local file header.
const LOCAL_NAME_LEN_OFFSET: u64 = 26;

/// What was done to each entry during a rebuild.
#[derive(Debug, Default)]
pub struct RebuildStats {
    /// STORE entries that needed padding
    pub aligned: Vec<String>,
    /// STORE entries already landing on an aligned offset
    pub kept: Vec<String>,
    /// Entries re-deflated from their uncompressed payload
    pub recompressed: Vec<String>,
}

/// One alignment-contract violation found by [`verify_bytes`].
#[derive(Debug, Clone)]
pub struct Violation {
    /// The offending entry
    pub name: String,
    /// What is wrong with it
    pub kind: ViolationKind,
}

/// The ways a must-store entry can violate its contract.
#[derive(Debug, Clone)]
pub enum ViolationKind {
    /// The entry is compressed but must be stored.
    Compressed,
    /// The entry's data region starts at an unaligned offset.
    Misaligned {
        /// Actual data offset found in the raw local header
        offset: u64,
    },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ViolationKind::Compressed => write!(f, "{}: compressed (must be STORE)", self.name),
            ViolationKind::Misaligned { offset } => {
                write!(f, "{}: data at offset {} (not {}-byte aligned)", self.name, offset, ALIGNMENT)
            }
        }
    }
}

/// Read every entry of the archive at `path` into memory.
///
/// Payloads are decompressed on read; directory entries are skipped (they
/// carry no data and are re-created implicitly by consumers that need them).
///
/// # Errors
/// [`ArchiveError`] if the archive cannot be opened or an entry cannot be
/// decompressed.
pub fn read_entries(path: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    let file = std::fs::File::open(path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut entries = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }

        let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry.read_to_end(&mut data)?;

        let method = if entry.compression() == CompressionMethod::Stored {
            CompressionKind::Store
        } else {
            CompressionKind::Deflate
        };

        let (dos_time, dos_date) = entry
            .last_modified()
            .map_or((0, 0), |dt| dos_datetime(&dt));

        entries.push(ArchiveEntry {
            name: entry.name().to_string(),
            method,
            data,
            unix_mode: entry.unix_mode(),
            dos_time,
            dos_date,
        });
    }

    Ok(entries)
}

/// Serialize `entries` into a complete archive with every must-store entry
/// uncompressed and aligned to `alignment`.
///
/// Entry order is preserved. Must-store entries (and entries that were
/// already stored) are written STORE with minimal zero padding in the local
/// header's extra field; all other entries are re-deflated.
///
/// # Errors
/// [`ArchiveError::Misaligned`] if the post-write offset re-derivation ever
/// disagrees with the padding computation; [`ArchiveError::Io`] on write
/// failure.
pub fn rebuild(
    entries: &[ArchiveEntry],
    alignment: u64,
) -> Result<(Vec<u8>, RebuildStats), ArchiveError> {
    let mut stats = RebuildStats::default();
    let mut out: Vec<u8> = Vec::new();
    // (central directory record, name bytes) pairs, written after all entries
    let mut central: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(entries.len());

    for entry in entries {
        let name_bytes = entry.name.as_bytes();
        let store = entry.must_store() || entry.method == CompressionKind::Store;

        let (method, payload): (u16, Vec<u8>) = if store {
            (0, entry.data.clone())
        } else {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&entry.data)?;
            stats.recompressed.push(entry.name.clone());
            (8, encoder.finish()?)
        };

        let crc = crc32fast::hash(&entry.data);
        // General-purpose flags: no data descriptor; UTF-8 name bit when needed
        let flags: u16 = if entry.name.is_ascii() { 0 } else { 0x0800 };

        let mut extra_len: u64 = 0;
        if store {
            let base_data_off = out.len() as u64 + LOCAL_HEADER_LEN + name_bytes.len() as u64;
            let rem = base_data_off % alignment;
            if rem != 0 {
                extra_len = alignment - rem;
                stats.aligned.push(entry.name.clone());
            } else {
                stats.kept.push(entry.name.clone());
            }
        }

        let header_offset = out.len() as u64;

        push_u32(&mut out, LOCAL_HEADER_SIG);
        push_u16(&mut out, 20); // version needed to extract
        push_u16(&mut out, flags);
        push_u16(&mut out, method);
        push_u16(&mut out, entry.dos_time);
        push_u16(&mut out, entry.dos_date);
        push_u32(&mut out, crc);
        push_u32(&mut out, payload.len() as u32);
        push_u32(&mut out, entry.data.len() as u32);
        push_u16(&mut out, name_bytes.len() as u16);
        push_u16(&mut out, extra_len as u16);
        out.extend_from_slice(name_bytes);
        out.extend(std::iter::repeat(0u8).take(extra_len as usize));

        // Guard: re-derive the offset the data is about to land on
        if store && !entry.data.is_empty() {
            let actual = out.len() as u64;
            if actual % alignment != 0 {
                return Err(ArchiveError::Misaligned {
                    name: entry.name.clone(),
                    offset: actual,
                });
            }
        }

        out.extend_from_slice(&payload);

        let mut record = Vec::with_capacity(46);
        push_u32(&mut record, CENTRAL_HEADER_SIG);
        push_u16(&mut record, (3 << 8) | 20); // made by: Unix host, v2.0
        push_u16(&mut record, 20); // version needed
        push_u16(&mut record, flags);
        push_u16(&mut record, method);
        push_u16(&mut record, entry.dos_time);
        push_u16(&mut record, entry.dos_date);
        push_u32(&mut record, crc);
        push_u32(&mut record, payload.len() as u32);
        push_u32(&mut record, entry.data.len() as u32);
        push_u16(&mut record, name_bytes.len() as u16);
        push_u16(&mut record, 0); // extra length (central)
        push_u16(&mut record, 0); // comment length
        push_u16(&mut record, 0); // disk number start
        push_u16(&mut record, 0); // internal attributes
        push_u32(&mut record, entry.unix_mode.map_or(0, |mode| mode << 16));
        push_u32(&mut record, header_offset as u32);
        central.push((record, name_bytes.to_vec()));

        debug!(
            "wrote {} ({}, {} byte{} padding)",
            entry.name,
            if store { "STORE" } else { "DEFLATE" },
            extra_len,
            if extra_len == 1 { "" } else { "s" },
        );
    }

    let central_start = out.len() as u64;
    for (record, name_bytes) in &central {
        out.extend_from_slice(record);
        out.extend_from_slice(name_bytes);
    }
    let central_size = out.len() as u64 - central_start;

    push_u32(&mut out, END_RECORD_SIG);
    push_u16(&mut out, 0); // disk number
    push_u16(&mut out, 0); // central directory start disk
    push_u16(&mut out, central.len() as u16);
    push_u16(&mut out, central.len() as u16);
    push_u32(&mut out, central_size as u32);
    push_u32(&mut out, central_start as u32);
    push_u16(&mut out, 0); // comment length

    info!(
        "rebuilt archive: {} entries, {} aligned, {} already aligned, {} recompressed",
        entries.len(),
        stats.aligned.len(),
        stats.kept.len(),
        stats.recompressed.len()
    );

    Ok((out, stats))
}

/// Verify the STORE + alignment contract of every must-store entry.
///
/// Data offsets are re-derived from the raw local-header bytes — never from
/// any cached offset — exactly as an installer would read them.
///
/// # Errors
/// [`ArchiveError`] if the archive cannot be parsed at all.
pub fn verify_bytes(data: &[u8], alignment: u64) -> Result<Vec<Violation>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let mut violations = Vec::new();

    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        if !must_store(entry.name()) {
            continue;
        }

        if entry.compression() != CompressionMethod::Stored {
            violations.push(Violation {
                name: entry.name().to_string(),
                kind: ViolationKind::Compressed,
            });
            continue;
        }

        let data_off = raw_data_offset(data, entry.header_start())?;
        if data_off % alignment != 0 {
            violations.push(Violation {
                name: entry.name().to_string(),
                kind: ViolationKind::Misaligned { offset: data_off },
            });
        }
    }

    Ok(violations)
}

/// Verify the archive at `path`; see [`verify_bytes`].
///
/// # Errors
/// [`ArchiveError`] if the file cannot be read or parsed.
pub fn verify_file(path: &Path, alignment: u64) -> Result<Vec<Violation>, ArchiveError> {
    let file = File::from_file(path).map_err(io_from)?;
    verify_bytes(file.data(), alignment)
}

/// Produce an entry map of the archive at `path` for human inspection.
///
/// # Errors
/// [`ArchiveError`] if the file cannot be read or parsed.
pub fn inspect(path: &Path) -> Result<Vec<EntryReport>, ArchiveError> {
    let file = File::from_file(path).map_err(io_from)?;
    let data = file.data();
    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let mut report = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        let data_off = raw_data_offset(data, entry.header_start())?;
        report.push(EntryReport {
            name: entry.name().to_string(),
            method: if entry.compression() == CompressionMethod::Stored {
                CompressionKind::Store
            } else {
                CompressionKind::Deflate
            },
            data_offset: data_off,
            aligned: data_off % ALIGNMENT == 0,
            must_store: must_store(entry.name()),
        });
    }

    report.sort_by_key(|r| r.data_offset);
    Ok(report)
}

/// Re-derive an entry's data offset from the raw bytes of its local header.
fn raw_data_offset(data: &[u8], header_start: u64) -> Result<u64, ArchiveError> {
    let lens_at = usize::try_from(header_start + LOCAL_NAME_LEN_OFFSET)
        .map_err(|_| zip::result::ZipError::InvalidArchive("local header offset overflow"))?;
    if lens_at + 4 > data.len() {
        return Err(zip::result::ZipError::InvalidArchive("local header out of bounds").into());
    }
    let name_len = u16::from_le_bytes([data[lens_at], data[lens_at + 1]]);
    let extra_len = u16::from_le_bytes([data[lens_at + 2], data[lens_at + 3]]);
    Ok(header_start + LOCAL_HEADER_LEN + u64::from(name_len) + u64::from(extra_len))
}

/// Convert a crate-level file error into the archive error surface.
fn io_from(err: crate::Error) -> ArchiveError {
    match err {
        crate::Error::Io(io) => ArchiveError::Io(io),
        other => ArchiveError::Io(std::io::Error::other(other.to_string())),
    }
}

fn dos_datetime(dt: &zip::DateTime) -> (u16, u16) {
    let time = (u16::from(dt.hour()) << 11)
        | (u16::from(dt.minute()) << 5)
        | (u16::from(dt.second()) / 2);
    let date = ((dt.year().saturating_sub(1980)) << 9)
        | (u16::from(dt.month()) << 5)
        | u16::from(dt.day());
    (time, date)
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}
