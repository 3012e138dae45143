// src/tokenizer/result.rs

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A piece with empty text was found while building the vocabulary.
    #[error("piece {0} is empty")]
    EmptyPiece(u32),

    #[error("piece \"{0}\" is already defined")]
    DuplicatePiece(String),

    #[error("unk is not defined")]
    UnkNotDefined,

    #[error("unk is already defined")]
    UnkAlreadyDefined,

    /// An id outside the vocabulary was passed to a decoding routine.
    #[error("invalid id for decoding: {0}")]
    UnknownId(u32),

    /// The user-defined piece automaton could not be built.
    #[error("failed to build prefix matcher: {0}")]
    Matcher(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<aho_corasick::BuildError> for Error {
    fn from(err: aho_corasick::BuildError) -> Self {
        Error::Matcher(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(Error::EmptyPiece(3).to_string(), "piece 3 is empty");
        assert_eq!(
            Error::DuplicatePiece("ab".into()).to_string(),
            "piece \"ab\" is already defined"
        );
        assert_eq!(Error::UnknownId(9).to_string(), "invalid id for decoding: 9");
    }

    #[test]
    fn test_json_error_converts() {
        let err: Error = serde_json::from_str::<u32>("x").unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().starts_with("JSON error: "));
    }
}
