//! Repair and verification of the container's embedded integrity values.
//!
//! The header carries two values that must both be correct for the runtime to
//! accept the file: a SHA-1 digest over everything after the file-size field,
//! and an Adler-32 checksum over everything after the signature field. The
//! checksum's coverage *includes* the digest, so after any byte mutation the
//! digest must be rewritten first and the checksum second.

use adler::adler32_slice;
use sha1::{Digest, Sha1};

use crate::{
    dex::header::{
        CHECKSUM_COVERAGE_OFFSET, CHECKSUM_OFFSET, CLASS_DEFS_SIZE_OFFSET, HEADER_LEN,
        SIGNATURE_COVERAGE_OFFSET, SIGNATURE_LEN, SIGNATURE_OFFSET,
    },
    error::{FormatError, IntegrityError},
    file::io::{read_le, write_le},
};

/// Recompute and write both embedded integrity values.
///
/// SHA-1 over `data[32..]` into the signature field, then Adler-32 over
/// `data[12..]` — which now covers the fresh digest — into the checksum
/// field. Call after every byte mutation, before handing the container back
/// to the archive.
///
/// # Errors
/// Returns [`FormatError::Truncated`] if `data` is shorter than a header.
pub fn update_checksums(data: &mut [u8]) -> Result<(), FormatError> {
    if data.len() < HEADER_LEN {
        return Err(FormatError::Truncated {
            what: "header",
            need: HEADER_LEN,
            have: data.len(),
        });
    }

    let mut hasher = Sha1::new();
    hasher.update(&data[SIGNATURE_COVERAGE_OFFSET..]);
    let digest: [u8; SIGNATURE_LEN] = hasher.finalize().into();
    data[SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE_LEN].copy_from_slice(&digest);

    let checksum = adler32_slice(&data[CHECKSUM_COVERAGE_OFFSET..]);
    write_le(&mut data[CHECKSUM_OFFSET..], checksum)?;

    Ok(())
}

/// Independently recompute both integrity values and compare against the
/// header.
///
/// # Errors
/// [`IntegrityError::ChecksumMismatch`] or
/// [`IntegrityError::SignatureMismatch`] when a stored value disagrees with
/// the recomputed one; [`FormatError::Truncated`] (wrapped in
/// [`crate::Error`]) for buffers shorter than a header.
pub fn verify_checksums(data: &[u8]) -> crate::Result<()> {
    if data.len() < HEADER_LEN {
        return Err(FormatError::Truncated {
            what: "header",
            need: HEADER_LEN,
            have: data.len(),
        }
        .into());
    }

    let stored: u32 = read_le(&data[CHECKSUM_OFFSET..]).map_err(crate::Error::Format)?;
    let computed = adler32_slice(&data[CHECKSUM_COVERAGE_OFFSET..]);
    if stored != computed {
        return Err(IntegrityError::ChecksumMismatch { stored, computed }.into());
    }

    let mut hasher = Sha1::new();
    hasher.update(&data[SIGNATURE_COVERAGE_OFFSET..]);
    let digest: [u8; SIGNATURE_LEN] = hasher.finalize().into();
    if data[SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE_LEN] != digest {
        return Err(IntegrityError::SignatureMismatch.into());
    }

    Ok(())
}

/// Pre-patch snapshot of the invariants an in-place patch must preserve.
///
/// An in-place patch never changes the container length or the number of
/// class definitions; if either moved, the patch corrupted structure it was
/// not supposed to touch and the entry must be abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Container length in bytes
    pub len: usize,
    /// Declared class-definition count
    pub class_count: u32,
}

impl Snapshot {
    /// Take a snapshot of `data`.
    ///
    /// # Errors
    /// Returns [`FormatError::Truncated`] for buffers shorter than a header.
    pub fn of(data: &[u8]) -> Result<Snapshot, FormatError> {
        if data.len() < HEADER_LEN {
            return Err(FormatError::Truncated {
                what: "header",
                need: HEADER_LEN,
                have: data.len(),
            });
        }
        Ok(Snapshot {
            len: data.len(),
            class_count: read_le(&data[CLASS_DEFS_SIZE_OFFSET..])?,
        })
    }

    /// Compare `data` against this snapshot.
    ///
    /// # Errors
    /// [`IntegrityError::SizeChanged`] or
    /// [`IntegrityError::ClassCountChanged`] on mismatch.
    pub fn check(&self, data: &[u8]) -> Result<(), IntegrityError> {
        if data.len() != self.len {
            return Err(IntegrityError::SizeChanged {
                before: self.len,
                after: data.len(),
            });
        }
        let class_count =
            read_le::<u32>(&data[CLASS_DEFS_SIZE_OFFSET..]).map_err(|_| {
                IntegrityError::SizeChanged {
                    before: self.len,
                    after: data.len(),
                }
            })?;
        if class_count != self.class_count {
            return Err(IntegrityError::ClassCountChanged {
                before: self.class_count,
                after: class_count,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_only() -> Vec<u8> {
        let mut data = vec![0u8; HEADER_LEN + 16];
        data[0..8].copy_from_slice(b"dex\n035\0");
        let len = data.len() as u32;
        data[32..36].copy_from_slice(&len.to_le_bytes());
        data
    }

    #[test]
    fn test_update_then_verify() {
        let mut data = header_only();
        update_checksums(&mut data).unwrap();
        verify_checksums(&data).unwrap();
    }

    #[test]
    fn test_mutation_invalidates() {
        let mut data = header_only();
        update_checksums(&mut data).unwrap();

        let last = data.len() - 1;
        data[last] ^= 0xFF;
        assert!(verify_checksums(&data).is_err());

        // Repair makes it valid again
        update_checksums(&mut data).unwrap();
        verify_checksums(&data).unwrap();
    }

    #[test]
    fn test_checksum_covers_digest() {
        let mut data = header_only();
        update_checksums(&mut data).unwrap();

        // Corrupt only the digest: the checksum (whose coverage includes the
        // signature field) must now fail as well
        data[SIGNATURE_OFFSET] ^= 0xFF;
        assert!(matches!(
            verify_checksums(&data),
            Err(crate::Error::Integrity(
                IntegrityError::ChecksumMismatch { .. }
            ))
        ));
    }

    #[test]
    fn test_snapshot_check() {
        let mut data = header_only();
        data[CLASS_DEFS_SIZE_OFFSET..CLASS_DEFS_SIZE_OFFSET + 4]
            .copy_from_slice(&3u32.to_le_bytes());

        let snapshot = Snapshot::of(&data).unwrap();
        assert_eq!(snapshot.class_count, 3);
        snapshot.check(&data).unwrap();

        data[CLASS_DEFS_SIZE_OFFSET] = 4;
        assert!(matches!(
            snapshot.check(&data),
            Err(IntegrityError::ClassCountChanged { before: 3, after: 4 })
        ));

        data.push(0);
        assert!(matches!(
            snapshot.check(&data),
            Err(IntegrityError::SizeChanged { .. })
        ));
    }
}
