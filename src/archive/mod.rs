//! APK/JAR archive reading, rebuilding, verification and inspection.
//!
//! The host runtime requires certain entries — the resource table and every
//! bytecode container — to be stored uncompressed with their data regions on
//! a 4-byte boundary. This module owns that contract: [`rebuild`] rewrites a
//! whole archive with explicit per-entry compression and padding, and
//! [`verify_bytes`] / [`verify_file`] audit the result from the raw header
//! bytes. An external aligner binary is never needed.

pub mod entry;
pub mod rebuild;

pub use entry::{dex_sort_key, is_dex_name, must_store, ArchiveEntry, CompressionKind, EntryReport};
pub use rebuild::{
    inspect, read_entries, rebuild, verify_bytes, verify_file, RebuildStats, Violation,
    ViolationKind, ALIGNMENT,
};
