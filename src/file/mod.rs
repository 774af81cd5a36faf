//! Memory-mapped and in-memory file access.
//!
//! [`crate::file::File`] owns the raw bytes of an archive or a standalone DEX
//! container, backed either by a memory map of an on-disk file or by an owned
//! buffer. Memory mapping keeps the fast raw-byte signature pre-filter (which
//! runs over whole multi-megabyte archives before any structured parse) free
//! of up-front copies.

pub(crate) mod io;
pub(crate) mod parser;

use std::path::Path;

use memmap2::Mmap;

use crate::Result;

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

/// Raw bytes of an input file, memory-mapped or owned.
///
/// # Examples
///
/// ```rust,no_run
/// use dexpatch::file::File;
///
/// let file = File::from_file("framework.jar".as_ref())?;
/// if file.contains(b"IS_INTERNATIONAL_BUILD") {
///     println!("worth parsing");
/// }
/// # Ok::<(), dexpatch::Error>(())
/// ```
pub struct File {
    backing: Backing,
}

impl File {
    /// Memory-map a file from disk.
    ///
    /// The mapping stays valid for the lifetime of the returned value; the
    /// file must not be truncated by another process while mapped.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be opened or mapped.
    pub fn from_file(path: &Path) -> Result<File> {
        let file = std::fs::File::open(path)?;
        // SAFETY: the mapping is read-only and the File handle is kept alive
        // by the Mmap for the duration of the borrow.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(File {
            backing: Backing::Mapped(mmap),
        })
    }

    /// Wrap an owned buffer.
    #[must_use]
    pub fn from_mem(data: Vec<u8>) -> File {
        File {
            backing: Backing::Owned(data),
        }
    }

    /// The raw bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(mmap) => mmap,
            Backing::Owned(vec) => vec,
        }
    }

    /// Length of the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Returns `true` if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /// Fast substring containment check over the raw bytes.
    ///
    /// Used as the signature pre-filter that decides whether an archive entry
    /// is worth a structured parse at all.
    #[must_use]
    pub fn contains(&self, needle: &[u8]) -> bool {
        contains(self.data(), needle)
    }
}

/// Substring containment over a byte slice.
#[must_use]
pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
