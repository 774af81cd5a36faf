//! Locators: resolve semantic names to table indices and code regions.
//!
//! Pure read-only lookups over the tables of a parsed container. "Not found"
//! is always a reported outcome (`None` or an empty set), never an error —
//! pattern absence is normal when the same patch profile is run against every
//! partition of a ROM.

use std::collections::BTreeSet;

use crate::{
    dex::{
        container::DexFile,
        walker::{class_code_regions, CodeRegion},
    },
    error::FormatError,
};

/// How a class descriptor is matched against a requested class name.
///
/// Exact matching is the default. Substring matching exists because some
/// call sites only know a fragment of an obfuscated or versioned descriptor;
/// it is deliberately a separately named mode so nobody relaxes a lookup by
/// accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassMatch {
    /// Descriptor must equal the requested name exactly.
    #[default]
    Exact,
    /// Descriptor must contain the requested name as a substring.
    Contains,
}

impl ClassMatch {
    /// Apply the match mode.
    #[must_use]
    pub fn matches(self, descriptor: &str, wanted: &str) -> bool {
        match self {
            ClassMatch::Exact => descriptor == wanted,
            ClassMatch::Contains => descriptor.contains(wanted),
        }
    }
}

/// Find the code region of `method_name` in the class named `class_desc`.
///
/// Scans class definitions for a matching type descriptor, then that class's
/// method descriptors for an exact method-name match among direct and virtual
/// methods; the first match wins. Overloads sharing a name within one class
/// are only distinguishable via [`find_method_index`] with a shorty.
///
/// Returns `Ok(None)` when the class or method is absent — a normal outcome.
///
/// # Errors
/// Propagates [`FormatError`] if the matched class's data is unreadable.
pub fn find_method(
    dex: &DexFile,
    class_desc: &str,
    method_name: &str,
    mode: ClassMatch,
) -> Result<Option<CodeRegion>, FormatError> {
    for idx in 0..dex.class_count() {
        let def = dex.class_def_at(idx)?;
        let descriptor = match dex.type_name_at(def.class_idx) {
            Ok(name) => name,
            // A class whose descriptor string cannot be decoded cannot be the
            // one we were asked for by name
            Err(_) => continue,
        };
        if !mode.matches(&descriptor, class_desc) {
            continue;
        }
        if def.class_data_off == 0 {
            continue;
        }

        for region in class_code_regions(dex, &def)? {
            if region.method_name == method_name {
                return Ok(Some(region));
            }
        }
    }

    Ok(None)
}

/// Find the method-table index of `(class_desc, name)`, optionally
/// disambiguated by the proto shorty.
///
/// This is the lookup used for call-site work: the index is what `invoke`
/// instructions carry as their operand. When overloads of `name` exist in
/// the class, pass the expected shorty (e.g. `ZL`) to select one; without a
/// shorty the first table entry wins.
///
/// # Errors
/// Propagates [`FormatError`] from table reads.
pub fn find_method_index(
    dex: &DexFile,
    class_desc: &str,
    name: &str,
    shorty: Option<&str>,
) -> Result<Option<u32>, FormatError> {
    let class_bytes = class_desc.as_bytes();
    let name_bytes = name.as_bytes();

    for idx in 0..dex.header().method_ids_size {
        let method = dex.method_id_at(idx)?;
        if dex.type_data_at(u32::from(method.class_idx))? != class_bytes {
            continue;
        }
        if dex.string_data_at(method.name_idx)? != name_bytes {
            continue;
        }
        if let Some(shorty) = shorty {
            let proto = dex.proto_id_at(u32::from(method.proto_idx))?;
            if dex.string_data_at(proto.shorty_idx)? != shorty.as_bytes() {
                continue;
            }
        }
        return Ok(Some(idx));
    }

    Ok(None)
}

/// Find every field-table index matching `(class_desc, field_name)`.
///
/// A well-formed container has at most one entry per (class, name) pair, but
/// malformed inputs may carry duplicates — returning the full set lets the
/// field patchers treat every reference uniformly. An empty set is a valid,
/// reported outcome.
///
/// # Errors
/// Propagates [`FormatError`] from table reads.
pub fn find_field_indices(
    dex: &DexFile,
    class_desc: &str,
    field_name: &str,
) -> Result<BTreeSet<u32>, FormatError> {
    let class_bytes = class_desc.as_bytes();
    let name_bytes = field_name.as_bytes();
    let mut indices = BTreeSet::new();

    for idx in 0..dex.header().field_ids_size {
        let field = dex.field_id_at(idx)?;
        if dex.type_data_at(u32::from(field.class_idx))? == class_bytes
            && dex.string_data_at(field.name_idx)? == name_bytes
        {
            indices.insert(idx);
        }
    }

    Ok(indices)
}

/// Find the string-pool index of `target` by binary search.
///
/// The pool is sorted, which the format mandates; byte-wise comparison
/// matches the pool order for the ASCII descriptors and literals this engine
/// queries.
///
/// # Errors
/// Propagates [`FormatError`] from string reads.
pub fn find_string_index(dex: &DexFile, target: &str) -> Result<Option<u32>, FormatError> {
    let target_bytes = target.as_bytes();
    let mut lo = 0u32;
    let mut hi = dex.string_count();

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match dex.string_data_at(mid)?.cmp(target_bytes) {
            std::cmp::Ordering::Equal => return Ok(Some(mid)),
            std::cmp::Ordering::Less => lo = mid + 1,
            std::cmp::Ordering::Greater => hi = mid,
        }
    }

    Ok(None)
}
