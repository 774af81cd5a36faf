//! Archive entry model and naming rules.

/// Compression applied to an entry when the archive is rebuilt.
///
/// The rebuilder only ever emits these two methods: must-store entries (and
/// entries that were already stored) stay uncompressed, everything else is
/// re-deflated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    /// No compression; required for must-store entries.
    Store,
    /// Raw deflate.
    Deflate,
}

/// One archive entry held fully in memory.
///
/// `data` is always the *uncompressed* payload; compression is applied at
/// write time according to the rebuild rules.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Entry name, forward-slash separated
    pub name: String,
    /// Compression the entry carried in the source archive
    pub method: CompressionKind,
    /// Uncompressed payload
    pub data: Vec<u8>,
    /// Unix permission bits from the source central directory, if present
    pub unix_mode: Option<u32>,
    /// MS-DOS time field of the source entry
    pub dos_time: u16,
    /// MS-DOS date field of the source entry
    pub dos_date: u16,
}

impl ArchiveEntry {
    /// Whether the host runtime requires this entry uncompressed and
    /// 4-byte aligned.
    #[must_use]
    pub fn must_store(&self) -> bool {
        must_store(&self.name)
    }
}

/// The must-store set: the resource table and every bytecode container.
#[must_use]
pub fn must_store(name: &str) -> bool {
    name == "resources.arsc" || is_dex_name(name)
}

/// Does `name` match the bytecode container pattern `classes[N].dex`?
#[must_use]
pub fn is_dex_name(name: &str) -> bool {
    let Some(stem) = name.strip_prefix("classes") else {
        return false;
    };
    let Some(digits) = stem.strip_suffix(".dex") else {
        return false;
    };
    digits.is_empty() || (digits.bytes().all(|b| b.is_ascii_digit()) && !digits.starts_with('0'))
}

/// Ordering key for bytecode container names: the unsuffixed `classes.dex`
/// first, then numerically.
#[must_use]
pub fn dex_sort_key(name: &str) -> u32 {
    name.strip_prefix("classes")
        .and_then(|stem| stem.strip_suffix(".dex"))
        .map_or(u32::MAX, |digits| {
            if digits.is_empty() {
                0
            } else {
                digits.parse().unwrap_or(u32::MAX)
            }
        })
}

/// One row of an archive inspection report.
#[derive(Debug, Clone)]
pub struct EntryReport {
    /// Entry name
    pub name: String,
    /// Compression method found in the archive
    pub method: CompressionKind,
    /// Byte offset at which the entry's data region starts
    pub data_offset: u64,
    /// Whether the data offset satisfies the alignment unit
    pub aligned: bool,
    /// Whether the entry is in the must-store set
    pub must_store: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_dex_name() {
        assert!(is_dex_name("classes.dex"));
        assert!(is_dex_name("classes2.dex"));
        assert!(is_dex_name("classes17.dex"));
        assert!(!is_dex_name("classes02.dex"));
        assert!(!is_dex_name("classesx.dex"));
        assert!(!is_dex_name("lib/classes.dex"));
        assert!(!is_dex_name("resources.arsc"));
    }

    #[test]
    fn test_must_store() {
        assert!(must_store("resources.arsc"));
        assert!(must_store("classes3.dex"));
        assert!(!must_store("AndroidManifest.xml"));
        assert!(!must_store("lib/arm64-v8a/libfoo.so"));
    }

    #[test]
    fn test_dex_sort_key() {
        let mut names = vec!["classes3.dex", "classes.dex", "classes10.dex", "classes2.dex"];
        names.sort_by_key(|n| dex_sort_key(n));
        assert_eq!(
            names,
            vec!["classes.dex", "classes2.dex", "classes3.dex", "classes10.dex"]
        );
    }
}
