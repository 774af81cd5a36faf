//! In-place instruction patchers.
//!
//! [`DexPatcher`] owns a mutable copy of the container bytes and exposes the
//! mutation operations: method-body replacement, field-reference-to-constant
//! rewriting, field and string reference swaps, and call-site suppression.
//! Every operation reports the number of sites it changed — zero is a normal
//! outcome (the target pattern simply isn't present in this container), not a
//! failure.
//!
//! Two rules hold across all operations:
//!
//! 1. **Scanning stays inside certified regions.** Scan ranges come from
//!    [`crate::dex::walker::walk_code_regions`]; raw file bytes are never
//!    pattern-matched (except by the clearly-scoped supplementary pass, see
//!    [`RawScanOptions`]).
//! 2. **Layout is preserved.** Each rewrite replaces an instruction with one
//!    of exactly the same byte width, so no offset anywhere else in the file
//!    moves. The container length and class count are checked against a
//!    pre-patch snapshot in [`DexPatcher::finish`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use dexpatch::dex::patch::{DexPatcher, StubOptions};
//! use dexpatch::dex::locate::ClassMatch;
//!
//! let bytes = std::fs::read("classes.dex")?;
//! let mut patcher = DexPatcher::new(bytes)?;
//!
//! // return true: const/4 v0, #1; return v0
//! let changed = patcher.stub_method(
//!     "Lcom/android/settings/InternalDeviceUtils;",
//!     "isAiSupported",
//!     ClassMatch::Exact,
//!     &[0x12, 0x10, 0x0F, 0x00],
//!     &StubOptions::default(),
//! )?;
//! if changed > 0 {
//!     let patched = patcher.finish()?;
//!     std::fs::write("classes.dex", patched)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod fields;
mod invokes;
mod stub;
mod strings;

pub use fields::{ConstEncoding, RawScanOptions};
pub use stub::StubOptions;

use crate::{
    dex::{
        container::DexFile,
        integrity::{update_checksums, Snapshot},
        walker::{walk_code_regions, CodeRegion},
    },
    error::FormatError,
    Result,
};

/// Restricts a scan to regions of one class and/or one method.
///
/// An empty filter admits every certified region. Class matching here is
/// always exact — the relaxed substring mode exists only on the by-name
/// locators, where it is explicitly requested.
#[derive(Debug, Clone, Default)]
pub struct SiteFilter {
    /// Only regions owned by this class descriptor
    pub class: Option<String>,
    /// Only regions of methods with this name
    pub method: Option<String>,
}

impl SiteFilter {
    /// A filter admitting every region.
    #[must_use]
    pub fn any() -> SiteFilter {
        SiteFilter::default()
    }

    /// Restrict to one class.
    #[must_use]
    pub fn in_class(class: impl Into<String>) -> SiteFilter {
        SiteFilter {
            class: Some(class.into()),
            method: None,
        }
    }

    /// Restrict to one (class, method) pair.
    #[must_use]
    pub fn in_method(class: impl Into<String>, method: impl Into<String>) -> SiteFilter {
        SiteFilter {
            class: Some(class.into()),
            method: Some(method.into()),
        }
    }

    pub(crate) fn admits(&self, region: &CodeRegion) -> bool {
        if let Some(class) = &self.class {
            if &region.class_name != class {
                return false;
            }
        }
        if let Some(method) = &self.method {
            if &region.method_name != method {
                return false;
            }
        }
        true
    }
}

/// A mutable container being patched.
///
/// Construction validates the header and snapshots the invariants an
/// in-place patch must preserve; [`DexPatcher::finish`] re-checks the
/// snapshot and repairs both embedded integrity values before releasing the
/// bytes. Nothing outside this type mutates container bytes.
pub struct DexPatcher {
    data: Vec<u8>,
    snapshot: Snapshot,
}

impl DexPatcher {
    /// Take ownership of container bytes for patching.
    ///
    /// # Errors
    /// Any [`FormatError`] from header validation — a malformed container is
    /// rejected before the first mutation, never partially trusted.
    pub fn new(data: Vec<u8>) -> Result<DexPatcher> {
        DexFile::parse(&data)?;
        let snapshot = Snapshot::of(&data)?;
        Ok(DexPatcher { data, snapshot })
    }

    /// The current container bytes (mutations applied, checksums stale).
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// A fresh read-only view over the current bytes.
    ///
    /// # Errors
    /// Propagates [`FormatError`] — cannot normally fail after construction,
    /// since no operation moves the header or tables.
    pub fn view(&self) -> std::result::Result<DexFile<'_>, FormatError> {
        DexFile::parse(&self.data)
    }

    /// Certified code regions of the current bytes.
    ///
    /// # Errors
    /// Propagates [`FormatError`] from the view.
    pub fn certified_regions(&self) -> Result<Vec<CodeRegion>> {
        Ok(walk_code_regions(&self.view()?))
    }

    /// Verify the snapshot, repair both checksums, and release the bytes.
    ///
    /// # Errors
    /// [`crate::IntegrityError`] if the container length or class count moved
    /// during patching — the bytes must then be discarded in favor of the
    /// original entry.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.snapshot.check(&self.data)?;
        update_checksums(&mut self.data)?;
        Ok(self.data)
    }

    /// Read the little-endian u16 at `pos`.
    pub(crate) fn u16_at(&self, pos: usize) -> u16 {
        u16::from_le_bytes([self.data[pos], self.data[pos + 1]])
    }

    /// Read the little-endian u32 at `pos`.
    pub(crate) fn u32_at(&self, pos: usize) -> u32 {
        u32::from_le_bytes([
            self.data[pos],
            self.data[pos + 1],
            self.data[pos + 2],
            self.data[pos + 3],
        ])
    }

    pub(crate) fn put_u16(&mut self, pos: usize, value: u16) {
        self.data[pos..pos + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn put_u32(&mut self, pos: usize, value: u32) {
        self.data[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
