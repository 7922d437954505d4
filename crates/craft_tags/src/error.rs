//! Error types for the tag grammar.

use thiserror::Error;

use crate::command::TagKind;

/// Result type alias for tag recognition.
pub type TagResult<T> = Result<T, TagParseError>;

/// A marker was found but its contents could not be read.
///
/// These never reach callers of [`crate::detect`]; they are logged and the
/// tag kind is treated as absent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagParseError {
    #[error("{0} marker is not closed on the same line")]
    Unterminated(TagKind),

    #[error("{0} block has no closing marker")]
    MissingClose(TagKind),

    #[error("{0} tag lists no entries")]
    EmptyList(TagKind),

    #[error("{0} tag has no valid key=value pairs")]
    NoValidPairs(TagKind),

    #[error("{0} block is missing its section name")]
    MissingSection(TagKind),

    #[error("{0} block has an empty body")]
    EmptyBody(TagKind),
}

impl TagParseError {
    /// The tag kind the error was raised for.
    pub fn kind(&self) -> TagKind {
        match self {
            Self::Unterminated(kind)
            | Self::MissingClose(kind)
            | Self::EmptyList(kind)
            | Self::NoValidPairs(kind)
            | Self::MissingSection(kind)
            | Self::EmptyBody(kind) => *kind,
        }
    }
}
