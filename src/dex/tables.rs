//! Fixed-size index table records.
//!
//! The container identifies every field, method and class through small
//! fixed-width records that cross-reference the string and type pools. These
//! are plain data carriers; index resolution lives on
//! [`crate::dex::DexFile`].

use bitflags::bitflags;

use crate::{error::FormatError, file::io::read_le_at};

bitflags! {
    /// Access flags attached to classes, fields and methods in class-data
    /// blobs and class definitions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u32 {
        /// Visible everywhere
        const PUBLIC = 0x1;
        /// Visible only to the defining class
        const PRIVATE = 0x2;
        /// Visible to package and subclasses
        const PROTECTED = 0x4;
        /// Per-class rather than per-instance
        const STATIC = 0x8;
        /// Not further overridable or assignable
        const FINAL = 0x10;
        /// Locks around the method body
        const SYNCHRONIZED = 0x20;
        /// Bridge method, compiler-added (volatile on fields)
        const VOLATILE_OR_BRIDGE = 0x40;
        /// Last argument is a rest-argument (transient on fields)
        const TRANSIENT_OR_VARARGS = 0x80;
        /// Implemented in native code; carries no code region
        const NATIVE = 0x100;
        /// Interface class
        const INTERFACE = 0x200;
        /// Unimplemented; carries no code region
        const ABSTRACT = 0x400;
        /// Strict floating-point rules
        const STRICT = 0x800;
        /// Not directly present in source
        const SYNTHETIC = 0x1000;
        /// Annotation class
        const ANNOTATION = 0x2000;
        /// Enum class or enum constant field
        const ENUM = 0x4000;
        /// Constructor method
        const CONSTRUCTOR = 0x10000;
        /// Synchronized as declared, not as implemented
        const DECLARED_SYNCHRONIZED = 0x20000;
    }
}

/// One field-id record: 8 bytes identifying a field by (class, type, name).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldId {
    /// Index of the owning type in the type table
    pub class_idx: u16,
    /// Index of the field's value type in the type table
    pub type_idx: u16,
    /// Index of the field name in the string table
    pub name_idx: u32,
}

impl FieldId {
    /// Read one record at `offset`.
    ///
    /// # Errors
    /// Returns [`FormatError::OutOfBounds`] on a short buffer.
    pub fn read_at(data: &[u8], mut offset: usize) -> Result<FieldId, FormatError> {
        Ok(FieldId {
            class_idx: read_le_at::<u16>(data, &mut offset)?,
            type_idx: read_le_at::<u16>(data, &mut offset)?,
            name_idx: read_le_at::<u32>(data, &mut offset)?,
        })
    }
}

/// One method-id record: 8 bytes identifying a method by (class, proto, name).
///
/// Name alone is an ambiguous key when overloads exist — callers additionally
/// filter by owning class, and by proto shorty where overloads matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodId {
    /// Index of the owning type in the type table
    pub class_idx: u16,
    /// Index of the prototype in the proto table
    pub proto_idx: u16,
    /// Index of the method name in the string table
    pub name_idx: u32,
}

impl MethodId {
    /// Read one record at `offset`.
    ///
    /// # Errors
    /// Returns [`FormatError::OutOfBounds`] on a short buffer.
    pub fn read_at(data: &[u8], mut offset: usize) -> Result<MethodId, FormatError> {
        Ok(MethodId {
            class_idx: read_le_at::<u16>(data, &mut offset)?,
            proto_idx: read_le_at::<u16>(data, &mut offset)?,
            name_idx: read_le_at::<u32>(data, &mut offset)?,
        })
    }
}

/// One proto-id record: 12 bytes describing a method prototype.
///
/// Only the shorty is consumed by this engine (overload disambiguation); the
/// parameter type list is never walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtoId {
    /// Index of the shorty descriptor in the string table
    pub shorty_idx: u32,
    /// Index of the return type in the type table
    pub return_type_idx: u32,
    /// Offset of the parameter type list, 0 if none
    pub parameters_off: u32,
}

impl ProtoId {
    /// Read one record at `offset`.
    ///
    /// # Errors
    /// Returns [`FormatError::OutOfBounds`] on a short buffer.
    pub fn read_at(data: &[u8], mut offset: usize) -> Result<ProtoId, FormatError> {
        Ok(ProtoId {
            shorty_idx: read_le_at::<u32>(data, &mut offset)?,
            return_type_idx: read_le_at::<u32>(data, &mut offset)?,
            parameters_off: read_le_at::<u32>(data, &mut offset)?,
        })
    }
}

/// One class-definition record: 32 bytes referencing the type, its superclass,
/// annotations, and the class-data blob that lists members and code regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassDef {
    /// Index of this class in the type table
    pub class_idx: u32,
    /// Access flags of the class
    pub access_flags: u32,
    /// Index of the superclass, `NO_INDEX` for java.lang.Object
    pub superclass_idx: u32,
    /// Offset of the interface type list, 0 if none
    pub interfaces_off: u32,
    /// Index of the source file name, `NO_INDEX` if unknown
    pub source_file_idx: u32,
    /// Offset of the annotations directory, 0 if none
    pub annotations_off: u32,
    /// Offset of the class-data blob, 0 if the class declares no members
    pub class_data_off: u32,
    /// Offset of the static initial values, 0 if none
    pub static_values_off: u32,
}

impl ClassDef {
    /// Read one record at `offset`.
    ///
    /// # Errors
    /// Returns [`FormatError::OutOfBounds`] on a short buffer.
    pub fn read_at(data: &[u8], mut offset: usize) -> Result<ClassDef, FormatError> {
        Ok(ClassDef {
            class_idx: read_le_at::<u32>(data, &mut offset)?,
            access_flags: read_le_at::<u32>(data, &mut offset)?,
            superclass_idx: read_le_at::<u32>(data, &mut offset)?,
            interfaces_off: read_le_at::<u32>(data, &mut offset)?,
            source_file_idx: read_le_at::<u32>(data, &mut offset)?,
            annotations_off: read_le_at::<u32>(data, &mut offset)?,
            class_data_off: read_le_at::<u32>(data, &mut offset)?,
            static_values_off: read_le_at::<u32>(data, &mut offset)?,
        })
    }
}
