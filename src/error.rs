use thiserror::Error;

/// Failures surfaced to the operator as a single line of console text.
///
/// Command handlers never propagate errors past the dispatch table; each
/// variant renders the message the operator sees.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Malformed input: bad hex, wrong key length, bad command syntax.
    #[error("invalid format: {0}")]
    Format(String),

    /// A fixed-capacity store is full. No state was changed.
    #[error("capacity reached: {0}")]
    Capacity(String),

    /// Unknown channel or contact name.
    #[error("not found: {0}")]
    NotFound(String),

    /// The external mesh core refused or failed the operation.
    #[error("{0}")]
    Transport(#[from] crate::mesh::TransportError),
}
