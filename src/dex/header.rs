//! DEX container header parsing and validation.
//!
//! The header is a fixed 112-byte structure at offset 0: the magic signature,
//! the two embedded integrity values (Adler-32 checksum and SHA-1 digest), the
//! declared file size, and a (count, offset) pair for each of the index tables
//! (strings, types, protos, fields, methods, class definitions).
//!
//! Validation is strict: every declared offset and count must be consistent
//! with the actual buffer length before any other component touches the file.
//! A container that fails any check here is rejected outright — downstream
//! code never works with a partially-trusted header.

use crate::{error::FormatError, file::io::read_le_at};

/// Total size of the fixed header.
pub const HEADER_LEN: usize = 112;

/// Offset of the Adler-32 checksum field.
pub const CHECKSUM_OFFSET: usize = 8;
/// Offset of the SHA-1 signature field.
pub const SIGNATURE_OFFSET: usize = 12;
/// Length of the SHA-1 signature field.
pub const SIGNATURE_LEN: usize = 20;
/// First byte covered by the Adler-32 checksum (the signature field onward).
pub const CHECKSUM_COVERAGE_OFFSET: usize = 12;
/// First byte covered by the SHA-1 digest (the file-size field onward).
pub const SIGNATURE_COVERAGE_OFFSET: usize = 32;
/// Offset of the class-definition count field.
pub const CLASS_DEFS_SIZE_OFFSET: usize = 96;

/// Little-endian constant expected in the endian tag field.
const ENDIAN_CONSTANT: u32 = 0x1234_5678;

/// Byte size of one string-id record.
pub const STRING_ID_SIZE: usize = 4;
/// Byte size of one type-id record.
pub const TYPE_ID_SIZE: usize = 4;
/// Byte size of one proto-id record.
pub const PROTO_ID_SIZE: usize = 12;
/// Byte size of one field-id record.
pub const FIELD_ID_SIZE: usize = 8;
/// Byte size of one method-id record.
pub const METHOD_ID_SIZE: usize = 8;
/// Byte size of one class-definition record.
pub const CLASS_DEF_SIZE: usize = 32;

/// The parsed, validated fixed header of a DEX container.
///
/// Holds the embedded integrity values and the (count, offset) pair of every
/// index table. All offsets have already been bounds-checked against the
/// buffer the header was parsed from.
#[derive(Debug, Clone)]
pub struct DexHeader {
    /// Adler-32 checksum over everything after the signature field
    pub checksum: u32,
    /// SHA-1 digest over everything after the file-size field
    pub signature: [u8; 20],
    /// Declared length of the whole container
    pub file_size: u32,
    /// Declared length of this header
    pub header_size: u32,
    /// Byte-order tag; only the little-endian constant is accepted
    pub endian_tag: u32,
    /// Offset of the map list
    pub map_off: u32,
    /// Number of string-id records
    pub string_ids_size: u32,
    /// Offset of the string-id table
    pub string_ids_off: u32,
    /// Number of type-id records
    pub type_ids_size: u32,
    /// Offset of the type-id table
    pub type_ids_off: u32,
    /// Number of proto-id records
    pub proto_ids_size: u32,
    /// Offset of the proto-id table
    pub proto_ids_off: u32,
    /// Number of field-id records
    pub field_ids_size: u32,
    /// Offset of the field-id table
    pub field_ids_off: u32,
    /// Number of method-id records
    pub method_ids_size: u32,
    /// Offset of the method-id table
    pub method_ids_off: u32,
    /// Number of class-definition records
    pub class_defs_size: u32,
    /// Offset of the class-definition table
    pub class_defs_off: u32,
    /// Declared length of the data section
    pub data_size: u32,
    /// Offset of the data section
    pub data_off: u32,
}

impl DexHeader {
    /// Parse and validate the header of `data`.
    ///
    /// # Errors
    /// - [`FormatError::BadMagic`] if the buffer does not start with a
    ///   `dex\n0NN\0` signature — callers probing unknown content match on
    ///   this to skip non-DEX data.
    /// - [`FormatError::Truncated`] if the buffer is shorter than the header
    ///   or any declared table extends past the end.
    /// - [`FormatError::Malformed`] for an unsupported endian tag or a
    ///   declared file size that disagrees with the buffer length.
    pub fn parse(data: &[u8]) -> Result<DexHeader, FormatError> {
        // Magic first: probing foreign content must report "not this format"
        // regardless of how short the input is
        if data.len() >= 4 && &data[0..4] != b"dex\n" {
            return Err(FormatError::BadMagic);
        }

        if data.len() < HEADER_LEN {
            return Err(FormatError::Truncated {
                what: "header",
                need: HEADER_LEN,
                have: data.len(),
            });
        }

        // "dex\n" + three ASCII digits + NUL. The version digits vary by
        // toolchain (035..041); all share the layout parsed here.
        if data[7] != 0 || !data[4..7].iter().all(u8::is_ascii_digit) {
            return Err(FormatError::BadMagic);
        }

        let mut offset = CHECKSUM_OFFSET;
        let checksum = read_le_at::<u32>(data, &mut offset)?;

        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&data[SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE_LEN]);
        offset = SIGNATURE_OFFSET + SIGNATURE_LEN;

        let header = DexHeader {
            checksum,
            signature,
            file_size: read_le_at::<u32>(data, &mut offset)?,
            header_size: read_le_at::<u32>(data, &mut offset)?,
            endian_tag: read_le_at::<u32>(data, &mut offset)?,
            map_off: {
                // link_size and link_off are not consumed by this engine
                offset += 8;
                read_le_at::<u32>(data, &mut offset)?
            },
            string_ids_size: read_le_at::<u32>(data, &mut offset)?,
            string_ids_off: read_le_at::<u32>(data, &mut offset)?,
            type_ids_size: read_le_at::<u32>(data, &mut offset)?,
            type_ids_off: read_le_at::<u32>(data, &mut offset)?,
            proto_ids_size: read_le_at::<u32>(data, &mut offset)?,
            proto_ids_off: read_le_at::<u32>(data, &mut offset)?,
            field_ids_size: read_le_at::<u32>(data, &mut offset)?,
            field_ids_off: read_le_at::<u32>(data, &mut offset)?,
            method_ids_size: read_le_at::<u32>(data, &mut offset)?,
            method_ids_off: read_le_at::<u32>(data, &mut offset)?,
            class_defs_size: read_le_at::<u32>(data, &mut offset)?,
            class_defs_off: read_le_at::<u32>(data, &mut offset)?,
            data_size: read_le_at::<u32>(data, &mut offset)?,
            data_off: read_le_at::<u32>(data, &mut offset)?,
        };

        if header.endian_tag != ENDIAN_CONSTANT {
            return Err(malformed_error!(
                "Unsupported endian tag {:#010x}",
                header.endian_tag
            ));
        }

        if header.file_size as usize != data.len() {
            return Err(malformed_error!(
                "Declared file size {} does not match buffer length {}",
                header.file_size,
                data.len()
            ));
        }

        if (header.header_size as usize) < HEADER_LEN {
            return Err(malformed_error!(
                "Declared header size {} below minimum {}",
                header.header_size,
                HEADER_LEN
            ));
        }

        header.check_table(data, "string_ids", header.string_ids_off, header.string_ids_size, STRING_ID_SIZE)?;
        header.check_table(data, "type_ids", header.type_ids_off, header.type_ids_size, TYPE_ID_SIZE)?;
        header.check_table(data, "proto_ids", header.proto_ids_off, header.proto_ids_size, PROTO_ID_SIZE)?;
        header.check_table(data, "field_ids", header.field_ids_off, header.field_ids_size, FIELD_ID_SIZE)?;
        header.check_table(data, "method_ids", header.method_ids_off, header.method_ids_size, METHOD_ID_SIZE)?;
        header.check_table(data, "class_defs", header.class_defs_off, header.class_defs_size, CLASS_DEF_SIZE)?;

        Ok(header)
    }

    /// Byte offset one past the end of the class-definition table.
    ///
    /// Default start of the supplementary raw scan; a layout heuristic, not a
    /// format guarantee, and therefore adjustable by callers.
    #[must_use]
    pub fn class_defs_end(&self) -> usize {
        self.class_defs_off as usize + self.class_defs_size as usize * CLASS_DEF_SIZE
    }

    fn check_table(
        &self,
        data: &[u8],
        what: &'static str,
        off: u32,
        count: u32,
        record_size: usize,
    ) -> Result<(), FormatError> {
        if count == 0 {
            return Ok(());
        }
        let need = u64::from(off) + u64::from(count) * record_size as u64;
        if need > data.len() as u64 {
            return Err(FormatError::Truncated {
                what,
                need: usize::try_from(need).unwrap_or(usize::MAX),
                have: data.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal header-only container: valid magic, endian tag, file size and
    /// empty tables.
    fn empty_container() -> Vec<u8> {
        let mut data = vec![0u8; HEADER_LEN];
        data[0..8].copy_from_slice(b"dex\n035\0");
        data[32..36].copy_from_slice(&(HEADER_LEN as u32).to_le_bytes());
        data[36..40].copy_from_slice(&(HEADER_LEN as u32).to_le_bytes());
        data[40..44].copy_from_slice(&ENDIAN_CONSTANT.to_le_bytes());
        data
    }

    #[test]
    fn test_parse_minimal() {
        let data = empty_container();
        let header = DexHeader::parse(&data).unwrap();
        assert_eq!(header.file_size as usize, HEADER_LEN);
        assert_eq!(header.string_ids_size, 0);
        assert_eq!(header.class_defs_size, 0);
    }

    #[test]
    fn test_bad_magic() {
        let mut data = empty_container();
        data[0] = b'P';
        assert!(matches!(
            DexHeader::parse(&data),
            Err(FormatError::BadMagic)
        ));

        // A version byte outside the digit range is not this format either
        let mut data = empty_container();
        data[5] = b'x';
        assert!(matches!(
            DexHeader::parse(&data),
            Err(FormatError::BadMagic)
        ));
    }

    #[test]
    fn test_truncated_header() {
        let mut data = vec![0u8; 40];
        data[0..4].copy_from_slice(b"dex\n");
        assert!(matches!(
            DexHeader::parse(&data),
            Err(FormatError::Truncated { what: "header", .. })
        ));
    }

    #[test]
    fn test_file_size_mismatch() {
        let mut data = empty_container();
        data[32..36].copy_from_slice(&999u32.to_le_bytes());
        assert!(matches!(
            DexHeader::parse(&data),
            Err(FormatError::Malformed { .. })
        ));
    }

    #[test]
    fn test_table_out_of_bounds() {
        let mut data = empty_container();
        // Declare a string table of 4 entries starting past the buffer end
        data[56..60].copy_from_slice(&4u32.to_le_bytes());
        data[60..64].copy_from_slice(&(HEADER_LEN as u32).to_le_bytes());
        assert!(matches!(
            DexHeader::parse(&data),
            Err(FormatError::Truncated {
                what: "string_ids",
                ..
            })
        ));
    }

    #[test]
    fn test_wrong_endian_tag() {
        let mut data = empty_container();
        data[40..44].copy_from_slice(&0x7856_3412u32.to_le_bytes());
        assert!(matches!(
            DexHeader::parse(&data),
            Err(FormatError::Malformed { .. })
        ));
    }
}
