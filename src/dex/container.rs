//! Read-only view of a parsed DEX container.
//!
//! [`DexFile`] is the entry point of the format reader: it validates the
//! header once, then resolves table indices to human-readable names on
//! demand. It never mutates the underlying bytes — mutation goes through
//! [`crate::dex::patch::DexPatcher`], which re-derives a fresh view after
//! each operation.

use crate::{
    dex::{
        header::{
            DexHeader, CLASS_DEF_SIZE, FIELD_ID_SIZE, METHOD_ID_SIZE, PROTO_ID_SIZE,
            STRING_ID_SIZE, TYPE_ID_SIZE,
        },
        tables::{ClassDef, FieldId, MethodId, ProtoId},
    },
    error::FormatError,
    file::{io::read_le_at, parser::Parser},
};

/// A parsed DEX container: raw bytes plus the validated header.
///
/// All index lookups are bounds-checked and fail with
/// [`FormatError::BadIndex`] rather than reading adjacent table memory.
///
/// # Examples
///
/// ```rust,no_run
/// use dexpatch::DexFile;
///
/// let bytes = std::fs::read("classes.dex")?;
/// let dex = DexFile::parse(&bytes)?;
/// println!("{} classes", dex.class_count());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct DexFile<'a> {
    data: &'a [u8],
    header: DexHeader,
}

impl<'a> DexFile<'a> {
    /// Parse a container, validating the header and all table bounds.
    ///
    /// # Errors
    /// See [`DexHeader::parse`] — bad magic, truncation and inconsistent
    /// declared sizes are all rejected here.
    pub fn parse(data: &'a [u8]) -> Result<DexFile<'a>, FormatError> {
        let header = DexHeader::parse(data)?;
        Ok(DexFile { data, header })
    }

    /// The validated header.
    #[must_use]
    pub fn header(&self) -> &DexHeader {
        &self.header
    }

    /// The raw container bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data
    }

    /// Number of class definitions.
    #[must_use]
    pub fn class_count(&self) -> u32 {
        self.header.class_defs_size
    }

    /// Number of entries in the string table.
    #[must_use]
    pub fn string_count(&self) -> u32 {
        self.header.string_ids_size
    }

    /// Raw bytes of the string at `idx`, without the length prefix or the
    /// NUL terminator.
    ///
    /// The pool is sorted, so byte-wise comparison against ASCII descriptors
    /// is what the binary-search locator uses; decoding is deferred to
    /// [`DexFile::string_at`].
    ///
    /// # Errors
    /// [`FormatError::BadIndex`] for an out-of-range index,
    /// [`FormatError::OutOfBounds`] if the record points outside the buffer.
    pub fn string_data_at(&self, idx: u32) -> Result<&'a [u8], FormatError> {
        if idx >= self.header.string_ids_size {
            return Err(FormatError::BadIndex {
                table: "string_ids",
                index: idx,
                count: self.header.string_ids_size,
            });
        }

        let mut offset = self.header.string_ids_off as usize + idx as usize * STRING_ID_SIZE;
        let data_off = read_le_at::<u32>(self.data, &mut offset)? as usize;

        let mut parser = Parser::new(self.data);
        parser.seek(data_off)?;
        // The prefix is the UTF-16 length, not the byte length; the byte run
        // ends at the first NUL (or the buffer end on corrupt input).
        let _utf16_len = parser.read_uleb128()?;

        let start = parser.pos();
        let mut end = start;
        while end < self.data.len() && self.data[end] != 0 {
            end += 1;
        }
        Ok(&self.data[start..end])
    }

    /// The string at `idx`, decoded as UTF-8.
    ///
    /// # Errors
    /// As [`DexFile::string_data_at`], plus [`FormatError::Malformed`] for
    /// byte runs that are not valid UTF-8 (rare MUTF-8 surrogate encodings).
    pub fn string_at(&self, idx: u32) -> Result<String, FormatError> {
        let bytes = self.string_data_at(idx)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| malformed_error!("String {} is not valid UTF-8: {}", idx, e.utf8_error()))
    }

    /// The type descriptor at `idx`, e.g. `Lcom/android/settings/Utils;`.
    ///
    /// # Errors
    /// [`FormatError::BadIndex`] for an out-of-range index.
    pub fn type_name_at(&self, idx: u32) -> Result<String, FormatError> {
        if idx >= self.header.type_ids_size {
            return Err(FormatError::BadIndex {
                table: "type_ids",
                index: idx,
                count: self.header.type_ids_size,
            });
        }
        let mut offset = self.header.type_ids_off as usize + idx as usize * TYPE_ID_SIZE;
        let string_idx = read_le_at::<u32>(self.data, &mut offset)?;
        self.string_at(string_idx)
    }

    /// Raw descriptor bytes of the type at `idx`.
    ///
    /// # Errors
    /// [`FormatError::BadIndex`] for an out-of-range index.
    pub fn type_data_at(&self, idx: u32) -> Result<&'a [u8], FormatError> {
        if idx >= self.header.type_ids_size {
            return Err(FormatError::BadIndex {
                table: "type_ids",
                index: idx,
                count: self.header.type_ids_size,
            });
        }
        let mut offset = self.header.type_ids_off as usize + idx as usize * TYPE_ID_SIZE;
        let string_idx = read_le_at::<u32>(self.data, &mut offset)?;
        self.string_data_at(string_idx)
    }

    /// The proto shorty at `proto_idx`, e.g. `ZL` for `boolean f(Object)`.
    ///
    /// # Errors
    /// [`FormatError::BadIndex`] for an out-of-range index.
    pub fn shorty_at(&self, proto_idx: u32) -> Result<String, FormatError> {
        let proto = self.proto_id_at(proto_idx)?;
        self.string_at(proto.shorty_idx)
    }

    /// The field-id record at `idx`.
    ///
    /// # Errors
    /// [`FormatError::BadIndex`] for an out-of-range index.
    pub fn field_id_at(&self, idx: u32) -> Result<FieldId, FormatError> {
        if idx >= self.header.field_ids_size {
            return Err(FormatError::BadIndex {
                table: "field_ids",
                index: idx,
                count: self.header.field_ids_size,
            });
        }
        FieldId::read_at(
            self.data,
            self.header.field_ids_off as usize + idx as usize * FIELD_ID_SIZE,
        )
    }

    /// The method-id record at `idx`.
    ///
    /// # Errors
    /// [`FormatError::BadIndex`] for an out-of-range index.
    pub fn method_id_at(&self, idx: u32) -> Result<MethodId, FormatError> {
        if idx >= self.header.method_ids_size {
            return Err(FormatError::BadIndex {
                table: "method_ids",
                index: idx,
                count: self.header.method_ids_size,
            });
        }
        MethodId::read_at(
            self.data,
            self.header.method_ids_off as usize + idx as usize * METHOD_ID_SIZE,
        )
    }

    /// The proto-id record at `idx`.
    ///
    /// # Errors
    /// [`FormatError::BadIndex`] for an out-of-range index.
    pub fn proto_id_at(&self, idx: u32) -> Result<ProtoId, FormatError> {
        if idx >= self.header.proto_ids_size {
            return Err(FormatError::BadIndex {
                table: "proto_ids",
                index: idx,
                count: self.header.proto_ids_size,
            });
        }
        ProtoId::read_at(
            self.data,
            self.header.proto_ids_off as usize + idx as usize * PROTO_ID_SIZE,
        )
    }

    /// The class-definition record at `idx`.
    ///
    /// # Errors
    /// [`FormatError::BadIndex`] for an out-of-range index.
    pub fn class_def_at(&self, idx: u32) -> Result<ClassDef, FormatError> {
        if idx >= self.header.class_defs_size {
            return Err(FormatError::BadIndex {
                table: "class_defs",
                index: idx,
                count: self.header.class_defs_size,
            });
        }
        ClassDef::read_at(
            self.data,
            self.header.class_defs_off as usize + idx as usize * CLASS_DEF_SIZE,
        )
    }

    /// The name of the method at `method_idx`, via the method and string
    /// tables.
    ///
    /// # Errors
    /// [`FormatError::BadIndex`] for an out-of-range index.
    pub fn method_name_at(&self, method_idx: u32) -> Result<String, FormatError> {
        let method = self.method_id_at(method_idx)?;
        self.string_at(method.name_idx)
    }
}
