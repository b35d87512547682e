use thiserror::Error;

/// Errors that can arise while manipulating shared data-model state
/// (independent of parsing or decoding a particular message).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoreError {
    #[error("attempted to load a second live count source (history/taken/not-taken) while one was already live")]
    MultipleLiveCountSources,

    #[error("call stack is empty; cannot resolve a return")]
    EmptyCallStack,
}

/// The top-level error type surfaced to embedders of the decoder.
///
/// This mirrors `samply-symbols::Error`'s approach of one `thiserror` enum
/// per crate, composed at the outermost boundary via `#[from]`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("core data-model error: {0}")]
    Core(#[from] CoreError),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("cannot open file: {0}")]
    CannotOpenFile(String),

    #[error("a required input argument was null")]
    InputArgNull,

    #[error("the ELF image handle was null")]
    ElfNull,

    #[error("failed to allocate internal memory")]
    MemCreateErr,

    #[error("trace status error: {0}")]
    TraceStatusError(String),

    #[error("ACK frame mismatch or short read")]
    AckErr,

    #[error("{0}")]
    Err(String),
}

impl Error {
    /// Stable string tag for this error variant, used the way
    /// `samply-symbols::Error::enum_as_string` feeds a stable identifier to
    /// callers that want to match on error kind without matching on the
    /// human-readable message.
    pub fn enum_as_string(&self) -> &'static str {
        match self {
            Error::Core(_) => "Core",
            Error::FileNotFound(_) => "FileNotFound",
            Error::CannotOpenFile(_) => "CannotOpenFile",
            Error::InputArgNull => "InputArgNull",
            Error::ElfNull => "ElfNull",
            Error::MemCreateErr => "MemCreateErr",
            Error::TraceStatusError(_) => "TraceStatusError",
            Error::AckErr => "AckErr",
            Error::Err(_) => "Err",
        }
    }
}
