use thiserror::Error;

/// Every error this crate can surface. `get_iscc`/`get_key` on an absent key
/// return `None`, not an error — there is no `NotFound` variant.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("malformed ISCC code: {0}")]
    MalformedCode(String),
    #[error("duplicate component kind: {0}")]
    DuplicateKind(String),
    #[error("mismatched length for distance: {0} vs {1}")]
    MismatchedLength(usize, usize),
    #[error("key already used for a different ISCC")]
    KeyAlreadyUsed,
    #[error("value already present under a different value for this key")]
    AlreadyPresent,
    #[error("storage map exhausted even after resizing")]
    MapFull,
    #[error("storage error: {0}")]
    Storage(#[from] heed::Error),
    #[error("envelope encode error: {0}")]
    EnvelopeEncode(#[from] rmp_serde::encode::Error),
    #[error("envelope decode error: {0}")]
    EnvelopeDecode(#[from] rmp_serde::decode::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
