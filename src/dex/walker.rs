//! Certified enumeration of method code regions.
//!
//! This is the safety-critical piece of the engine: all instruction scanning
//! must stay inside regions this walker certifies. Scanning raw file bytes
//! for an opcode value produces false positives whenever the same byte value
//! occurs inside an index table entry; once that happens, parsing is
//! misaligned and real matches are silently skipped. The patchers therefore
//! take their scan ranges exclusively from [`walk_code_regions`].
//!
//! The walk follows class-definition → class-data blob → method descriptor
//! list, decoding the format's ULEB128 counts and deltas with bounds checks
//! at every step. One corrupt class never hides the rest: a decode failure
//! skips the remainder of *that class only* and the walk continues.

use log::warn;

use crate::{
    dex::{
        container::DexFile,
        tables::{AccessFlags, ClassDef},
    },
    error::FormatError,
    file::parser::Parser,
};

/// Length of the fixed code-region header preceding the instruction stream.
pub const CODE_HEADER_LEN: usize = 16;

/// Offset of the registers-needed count within a code-region header.
pub const CODE_REGISTERS_OFFSET: usize = 0;
/// Offset of the incoming-parameter-register count.
pub const CODE_INS_OFFSET: usize = 2;
/// Offset of the outgoing-argument-register count.
pub const CODE_OUTS_OFFSET: usize = 4;
/// Offset of the exception-handler-table size.
pub const CODE_TRIES_OFFSET: usize = 6;
/// Offset of the debug-info offset field.
pub const CODE_DEBUG_INFO_OFFSET: usize = 8;
/// Offset of the instruction length field (in 2-byte code units).
pub const CODE_INSNS_SIZE_OFFSET: usize = 12;

/// One certified method code region.
///
/// Carries the byte range of the instruction stream together with the names
/// that locate it semantically. Produced only by the walker; patchers treat
/// possession of a `CodeRegion` as the license to scan those bytes.
#[derive(Debug, Clone)]
pub struct CodeRegion {
    /// Offset of the 16-byte code-region header
    pub code_off: usize,
    /// Offset of the first instruction byte
    pub insns_off: usize,
    /// Length of the instruction stream in bytes
    pub insns_len: usize,
    /// Descriptor of the owning class, e.g. `Lmiui/os/Build;`
    pub class_name: String,
    /// Name of the method
    pub method_name: String,
    /// Absolute index into the method table
    pub method_idx: u32,
    /// Access flags from the method descriptor
    pub access_flags: AccessFlags,
}

impl CodeRegion {
    /// End of the instruction stream (exclusive).
    #[must_use]
    pub fn insns_end(&self) -> usize {
        self.insns_off + self.insns_len
    }
}

/// Enumerate every method code region in the container.
///
/// Classes whose class-data blob fails to decode are skipped with a warning;
/// the remaining classes are still walked, so one corrupt class cannot hide
/// every other class's methods.
#[must_use]
pub fn walk_code_regions(dex: &DexFile) -> Vec<CodeRegion> {
    let mut regions = Vec::new();

    for idx in 0..dex.class_count() {
        let def = match dex.class_def_at(idx) {
            Ok(def) => def,
            Err(err) => {
                warn!("class_def {idx}: unreadable record, skipping: {err}");
                continue;
            }
        };

        if def.class_data_off == 0 {
            continue;
        }

        match class_code_regions(dex, &def) {
            Ok(class_regions) => regions.extend(class_regions),
            Err(err) => {
                warn!("class_def {idx}: corrupt class data, skipping class: {err}");
            }
        }
    }

    regions
}

/// Enumerate the code regions of a single class, strictly.
///
/// Unlike [`walk_code_regions`], any decode failure is propagated — callers
/// that asked for one specific class want to know it is unreadable.
///
/// # Errors
/// Any [`FormatError`] produced while decoding the class-data blob, the code
/// headers, or the names the descriptors reference.
pub fn class_code_regions(
    dex: &DexFile,
    def: &ClassDef,
) -> Result<Vec<CodeRegion>, FormatError> {
    let class_name = dex.type_name_at(def.class_idx)?;
    let data = dex.data();

    let mut parser = Parser::new(data);
    parser.seek(def.class_data_off as usize)?;

    let static_fields = parser.read_uleb128()?;
    let instance_fields = parser.read_uleb128()?;
    let direct_methods = parser.read_uleb128()?;
    let virtual_methods = parser.read_uleb128()?;

    // Field descriptors are (index delta, access flags) pairs; only skipped.
    // Saturating add: an absurd declared count terminates through the
    // bounds-checked reads, not through an overflow.
    for _ in 0..static_fields.saturating_add(instance_fields) {
        parser.read_uleb128()?;
        parser.read_uleb128()?;
    }

    let mut regions = Vec::new();

    // Direct and virtual method lists each restart the running index.
    for method_group in [direct_methods, virtual_methods] {
        let mut method_idx = 0u32;
        for _ in 0..method_group {
            let idx_delta = parser.read_uleb128()?;
            let access_flags = parser.read_uleb128()?;
            let code_off = parser.read_uleb128()? as usize;

            method_idx = method_idx.wrapping_add(idx_delta);

            // Abstract and native methods carry no code region
            if code_off == 0 {
                continue;
            }

            if code_off + CODE_HEADER_LEN > data.len() {
                return Err(FormatError::Truncated {
                    what: "code region header",
                    need: code_off + CODE_HEADER_LEN,
                    have: data.len(),
                });
            }

            let mut size_field = code_off + CODE_INSNS_SIZE_OFFSET;
            let insns_units = crate::file::io::read_le_at::<u32>(data, &mut size_field)?;
            let insns_len = insns_units as usize * 2;
            let insns_off = code_off + CODE_HEADER_LEN;

            if insns_off + insns_len > data.len() {
                return Err(FormatError::Truncated {
                    what: "instruction stream",
                    need: insns_off + insns_len,
                    have: data.len(),
                });
            }

            regions.push(CodeRegion {
                code_off,
                insns_off,
                insns_len,
                class_name: class_name.clone(),
                method_name: dex.method_name_at(method_idx)?,
                method_idx,
                access_flags: AccessFlags::from_bits_truncate(access_flags),
            });
        }
    }

    Ok(regions)
}
