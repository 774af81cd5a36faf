//! Convenient re-exports of the most commonly used types and traits.
//!
//! # Example
//!
//! ```rust,no_run
//! use dexpatch::prelude::*;
//!
//! let registry = ProfileRegistry::builtin();
//! let summary = ApkPatcher::new()
//!     .patch("Settings.apk".as_ref(), registry.get("settings-ai").unwrap())?;
//! println!("{} site(s) changed", summary.sites_changed);
//! # Ok::<(), dexpatch::Error>(())
//! ```

pub use crate::archive::{
    dex_sort_key, inspect, is_dex_name, must_store, read_entries, rebuild, verify_bytes,
    verify_file, ArchiveEntry, CompressionKind, EntryReport, RebuildStats, Violation,
    ViolationKind, ALIGNMENT,
};
pub use crate::dex::{
    integrity::{update_checksums, verify_checksums, Snapshot},
    locate::{find_field_indices, find_method, find_method_index, find_string_index, ClassMatch},
    patch::{ConstEncoding, DexPatcher, RawScanOptions, SiteFilter, StubOptions},
    walker::walk_code_regions,
    CodeRegion, DexFile, DexHeader,
};
pub use crate::patcher::{ApkPatcher, PatchOp, PatchProfile, PatchSummary, ProfileRegistry};
pub use crate::tools::{legacy::zipalign, run_tool, ToolOutput};
pub use crate::{
    ArchiveError, Error, FormatError, IntegrityError, PatchError, Result, ToolError,
};
