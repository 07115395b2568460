use thiserror::Error;

/// The primary error type for a .wld decode.
///
/// Every variant is fatal to the load in progress: the format has no
/// sub-file recovery unit, so a container either decodes completely or not
/// at all.  Recoverable oddities (unknown fragment kinds, dangling
/// references) are not errors — they surface as generic records and
/// unresolved references instead.
#[derive(Error, Debug)]
pub enum WldError {
    #[error("Truncated input: needed {needed} byte(s) at offset {offset}, {remaining} remaining")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("Invalid magic number {found:#010x}")]
    InvalidMagic { found: u32 },
    #[error("Unsupported version: {0:#010x}")]
    UnsupportedVersion(u32),
    #[error("Structural corruption: {0}")]
    StructuralCorruption(String),
    #[error("Fragment count mismatch: header declares {declared}, stream contains {found}")]
    FragmentCountMismatch { declared: u32, found: u32 },
    #[error("Fragment {index} (kind {kind:#04x}) failed to decode: {source}")]
    FragmentDecode {
        index: usize,
        kind: u32,
        #[source]
        source: Box<WldError>,
    },
    #[error("Unknown field tag '{0}' in type string")]
    UnknownFieldTag(char),
}

/// A convenience `Result` type alias using the crate's [`WldError`] type.
pub type Result<T> = std::result::Result<T, WldError>;
