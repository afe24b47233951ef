//! ABC Tunes - ABC music notation library
//!
//! Parses ABC tunebooks into tunes whose elements carry resolved durations,
//! accidentals, clefs, ties, beams, measures, lyrics and decorations.

pub mod body_parser;
pub mod config;
pub mod error;
pub mod field_parser;
pub mod lyrics_parser;
pub mod macros;
pub mod parser;
pub mod transforms;
pub mod tune;
pub mod tunebook;
pub mod types;
pub mod util;

// Re-export commonly used types
pub use config::{AccidentalPropagation, ParserOptions};
pub use error::{AbcError, Diagnostic, DiagnosticKind, Severity};
pub use parser::{Parser, parse, parse_fragment};
pub use tune::Tune;
pub use tunebook::{Section, Tunebook};
pub use types::duration::Duration;
pub use types::element::Element;
pub use types::key::Key;
pub use types::meter::Meter;
pub use types::pitch::Pitch;

pub type Result<T> = std::result::Result<T, AbcError>;

pub fn tune_to_json(tune: &Tune) -> serde_json::Result<String> {
    serde_json::to_string_pretty(tune)
}

pub fn tunebook_to_json(tunebook: &Tunebook) -> serde_json::Result<String> {
    serde_json::to_string_pretty(tunebook)
}
