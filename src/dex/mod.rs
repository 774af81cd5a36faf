//! Parsing, walking, locating and patching of DEX bytecode containers.
//!
//! The submodules mirror the pipeline order:
//!
//! - [`header`] / [`tables`] / [`container`] — the format reader: validate
//!   the fixed header and resolve table indices to names. No mutation.
//! - [`walker`] — certify the byte ranges that actually hold instructions;
//!   the only source of scan ranges for the patchers.
//! - [`locate`] — resolve (class, method) and (class, field) names to code
//!   regions and table indices.
//! - [`opcodes`] — the fixed-width instruction encodings the engine rewrites.
//! - [`patch`] — the mutation operations, all layout-preserving.
//! - [`integrity`] — repair of the embedded Adler-32/SHA-1 pair after any
//!   mutation, plus the pre/post patch snapshot guard.

pub mod container;
pub mod header;
pub mod integrity;
pub mod locate;
pub mod opcodes;
pub mod patch;
pub mod tables;
pub mod walker;

pub use container::DexFile;
pub use header::DexHeader;
pub use patch::DexPatcher;
pub use walker::CodeRegion;
