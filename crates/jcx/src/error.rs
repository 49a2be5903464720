use miette::{Diagnostic, LabeledSpan, SourceSpan};

use crate::tree::ValueKind;

/// Maximum nesting depth accepted by the text parsers, the encoders and the
/// materializing decoders. Deeper input fails with [`Error::DepthExceeded`]
/// instead of overflowing the call stack.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error("unexpected token at byte {position}")]
    UnexpectedToken { position: usize },
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("truncated record")]
    TruncatedRecord,
    #[error("unknown type tag 0x{0:02x}")]
    UnknownTypeTag(u8),
    #[error("duplicate key `{0}`")]
    DuplicateKey(String),
    #[error("invalid magic bytes")]
    InvalidMagic,
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u32),
    #[error("invalid UTF-8 in string data")]
    InvalidUtf8,
    #[error("nesting deeper than {MAX_DEPTH} levels")]
    DepthExceeded,
    #[error("i/o error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEndOfInput
        } else {
            Error::Io(err.to_string())
        }
    }
}

impl Error {
    /// Attaches the source text to a parse error, producing a diagnostic
    /// that renders with the offending span highlighted.
    pub fn with_source(self, source_code: impl Into<String>) -> SourceError {
        let source_code = source_code.into();
        let offset = match &self {
            Error::UnexpectedToken { position } => (*position).min(source_code.len()),
            Error::UnexpectedEndOfInput => source_code.len().saturating_sub(1),
            _ => 0,
        };
        SourceError {
            cause: self,
            location: SourceSpan::new(offset.into(), 1),
            source_code,
        }
    }
}

/// A parse error bundled with the text it occurred in, for user-facing
/// reporting.
#[derive(Debug, PartialEq, thiserror::Error)]
#[error("{cause}")]
pub struct SourceError {
    pub cause: Error,
    pub source_code: String,
    pub location: SourceSpan,
}

impl Diagnostic for SourceError {
    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some(self.cause.to_string()),
            self.location,
        ))))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }
}
