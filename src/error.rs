//! Fatal parse errors and the non-fatal diagnostics collected on tunes and
//! tunebooks.

use serde::Serialize;
use thiserror::Error;

/// Fatal error: no tune or tunebook is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AbcError {
    #[error("Line #{line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Tune X:{refnum}: {source}")]
    InTune {
        refnum: u32,
        #[source]
        source: Box<AbcError>,
    },
}

impl AbcError {
    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        AbcError::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    pub fn line(&self) -> usize {
        match self {
            AbcError::Syntax { line, .. } => *line,
            AbcError::InTune { source, .. } => source.line(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum DiagnosticKind {
    #[error("duplicate X: field")]
    DuplicateRefNumber,

    #[error("X: value \"{0}\" is not an integer")]
    InvalidRefNumber(String),

    #[error("{0}: field is not allowed in the {1}")]
    FieldNotAllowed(char, &'static str),

    #[error("unknown field identifier \"{0}\"")]
    UnknownField(char),

    #[error("invalid {0}: field value \"{1}\": {2}")]
    InvalidFieldValue(char, String, String),

    #[error("unknown clef \"{0}\"")]
    UnknownClef(String),

    #[error("unknown attribute \"{0}\"")]
    UnknownAttribute(String),

    #[error("unknown decoration \"{0}\"")]
    UnknownDecoration(String),

    #[error("cannot include \"{0}\": {1}")]
    IncludeFailed(String, String),

    #[error("music found before K: field")]
    MissingKey,

    #[error("grace notes without a following note")]
    DanglingGraceNotes,

    #[error("+: continuation without a preceding field")]
    DanglingContinuation,
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::DuplicateRefNumber
            | DiagnosticKind::InvalidRefNumber(_)
            | DiagnosticKind::FieldNotAllowed(..)
            | DiagnosticKind::InvalidFieldValue(..)
            | DiagnosticKind::MissingKey => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub severity: Severity,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(line: usize, kind: DiagnosticKind) -> Self {
        Self {
            line,
            severity: kind.severity(),
            kind,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line #{}: {}", self.line, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = AbcError::syntax(3, 7, "Unexpected character '#'");
        assert_eq!(err.to_string(), "Line #3, column 7: Unexpected character '#'");
        assert_eq!(err.line(), 3);

        let d = Diagnostic::new(2, DiagnosticKind::DuplicateRefNumber);
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.to_string(), "Line #2: duplicate X: field");

        let d = Diagnostic::new(5, DiagnosticKind::UnknownClef("banjo".to_string()));
        assert_eq!(d.severity, Severity::Warning);
    }
}
