use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::error::FormatError::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::error::FormatError::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// Errors raised while parsing a DEX container.
///
/// A container that trips any of these is rejected outright — the parser never
/// hands out a partially-trusted view of a malformed file.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The buffer does not start with a `dex\n0NN\0` magic signature.
    ///
    /// Callers probing arbitrary archive entries match on this variant to
    /// skip non-DEX content without treating it as a failure.
    #[error("Not a DEX container (bad magic)")]
    BadMagic,

    /// A declared table or region extends past the end of the buffer.
    #[error("Truncated container - {what}: need {need} bytes, have {have}")]
    Truncated {
        /// Which structure overran the buffer
        what: &'static str,
        /// Bytes required by the declared layout
        need: usize,
        /// Bytes actually available
        have: usize,
    },

    /// An index resolved against a table it does not fit into.
    #[error("Index {index} out of range for {table} table of {count} entries")]
    BadIndex {
        /// Table the lookup was performed against
        table: &'static str,
        /// The offending index
        index: u32,
        /// Number of entries the table declares
        count: u32,
    },

    /// A read would have crossed the end of the buffer.
    #[error("Out of bound read would have occurred!")]
    OutOfBounds,

    /// The container structure is damaged in a way the other variants don't
    /// capture. Carries the source location where the damage was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// Description of what was malformed
        message: String,
        /// Source file in which this error was raised
        file: &'static str,
        /// Source line in which this error was raised
        line: u32,
    },
}

/// Errors raised by the instruction patchers.
///
/// Zero sites changed is *not* an error — patchers report it as a normal
/// count. These variants cover requests that cannot be satisfied at all.
#[derive(Error, Debug)]
pub enum PatchError {
    /// The replacement sequence does not fit the target code region.
    #[error("Replacement of {need} bytes exceeds code region of {have} bytes")]
    StubTooLarge {
        /// Bytes available in the region
        have: usize,
        /// Bytes the replacement requires
        need: usize,
    },

    /// A class, method or field named by the patch request does not exist in
    /// this container.
    #[error("Patch target not found: {target}")]
    TargetNotFound {
        /// Human-readable description of the missing target
        target: String,
    },

    /// A trim-mode replacement must be a whole number of 2-byte code units.
    #[error("Replacement of {len} bytes is not code-unit aligned")]
    UnitMisaligned {
        /// Length of the offending replacement
        len: usize,
    },

    /// A string index only representable in the jumbo encoding was requested
    /// for the 4-byte `const-string` form.
    #[error("String index {index} does not fit the short const-string encoding")]
    StringIndexTooWide {
        /// The oversized pool index
        index: u32,
    },

    /// The requested immediate does not fit the selected constant encoding.
    #[error("Literal {value} does not fit the {encoding} encoding")]
    LiteralOutOfRange {
        /// The requested immediate value
        value: i32,
        /// Name of the encoding that cannot hold it
        encoding: &'static str,
    },
}

/// Post-patch consistency violations.
///
/// Compared against a snapshot taken before mutation; any mismatch aborts the
/// entry and leaves the original bytes in place.
#[derive(Error, Debug)]
pub enum IntegrityError {
    /// The container changed length during an in-place patch.
    #[error("Container size changed: {before} -> {after} bytes")]
    SizeChanged {
        /// Length before patching
        before: usize,
        /// Length after patching
        after: usize,
    },

    /// The class-definition count changed during an in-place patch.
    #[error("Class count changed: {before} -> {after}")]
    ClassCountChanged {
        /// Count before patching
        before: u32,
        /// Count after patching
        after: u32,
    },

    /// The stored Adler-32 checksum does not match the recomputed value.
    #[error("Header checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Value found in the header
        stored: u32,
        /// Value recomputed over the payload
        computed: u32,
    },

    /// The stored SHA-1 signature does not match the recomputed digest.
    #[error("Header signature does not match recomputed digest")]
    SignatureMismatch,
}

/// Errors raised while reading, rebuilding or verifying an archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The underlying ZIP reader rejected the archive.
    #[error("{0}")]
    Zip(#[from] zip::result::ZipError),

    /// Filesystem I/O failure while reading or writing the archive.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// A freshly written STORE entry landed at an unaligned data offset.
    ///
    /// The rebuilder re-derives every data offset after writing the local
    /// header; this firing means the padding computation is wrong and the
    /// output must not be used.
    #[error("Entry '{name}' data landed at unaligned offset {offset}")]
    Misaligned {
        /// Entry whose data region is misaligned
        name: String,
        /// The offending data offset
        offset: u64,
    },

    /// Post-rebuild verification found must-store entries violating the
    /// STORE + alignment contract.
    #[error("Archive verification failed with {violations} violation(s)")]
    VerifyFailed {
        /// Number of violations reported
        violations: usize,
    },
}

/// Failures of an external tool invocation.
///
/// One wrapper type for every subprocess the crate shells out to (legacy
/// decompiler/assembler, external aligner), so callers can distinguish the
/// three ways a tool run goes wrong.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The process could not be started at all.
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying OS error
        source: std::io::Error,
    },

    /// The process ran past its deadline and was killed.
    #[error("'{program}' timed out after {secs}s")]
    Timeout {
        /// Program that was killed
        program: String,
        /// The deadline that was exceeded
        secs: u64,
    },

    /// The process exited with a nonzero status.
    #[error("'{program}' exited with status {status}: {stderr}")]
    Failed {
        /// Program that failed
        program: String,
        /// Exit status code (-1 when terminated by a signal)
        status: i32,
        /// Captured standard error, truncated for display
        stderr: String,
    },
}

/// The generic Error type, covering every failure this library can return.
///
/// Each pipeline layer has its own focused error enum; this umbrella exists so
/// orchestration code can drive the whole patch pipeline behind a single
/// [`crate::Result`].
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or truncated DEX container.
    #[error("{0}")]
    Format(#[from] FormatError),

    /// An instruction patch request could not be satisfied.
    #[error("{0}")]
    Patch(#[from] PatchError),

    /// Post-patch snapshot or checksum mismatch.
    #[error("{0}")]
    Integrity(#[from] IntegrityError),

    /// Archive rebuild or verification failure.
    #[error("{0}")]
    Archive(#[from] ArchiveError),

    /// External tool invocation failure.
    #[error("{0}")]
    Tool(#[from] ToolError),

    /// Filesystem I/O error outside the archive layer.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}
