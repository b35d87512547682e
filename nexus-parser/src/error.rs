use thiserror::Error;

/// Per-message parser errors.
///
/// All of these are recoverable at the session level: the caller drops the
/// offending message, the parser resynchronizes on the next END boundary,
/// and decoding continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("a required field ran past the end of the message")]
    EndOfMessage,

    #[error("trailing bits remained after the message's fields were parsed")]
    BadMessage,

    #[error("variable field exceeded 64 bits with non-zero high bits")]
    VariableFieldOverflow,

    #[error("unrecognized TCode {0}")]
    UnknownTCode(u8),

    #[error("ResourceFull rcode {0} has no defined counter semantics")]
    UnknownResourceFullCode(u8),
}

pub type Result<T> = std::result::Result<T, ParseError>;
