use crate::types::instruction::Instruction;
use anyhow::{Result, bail};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// How far an explicit accidental carries within its measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AccidentalPropagation {
    /// Only the note that carries it.
    Not,
    /// Later notes of the same letter and octave.
    Octave,
    /// Later notes of the same letter in any octave.
    #[default]
    Pitch,
}

impl FromStr for AccidentalPropagation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "not" => Ok(AccidentalPropagation::Not),
            "octave" => Ok(AccidentalPropagation::Octave),
            "pitch" => Ok(AccidentalPropagation::Pitch),
            other => bail!("Invalid propagate-accidentals value \"{}\"", other),
        }
    }
}

/// Symbols that end a score line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineBreakSet {
    pub eol: bool,
    pub dollar: bool,
    pub bang: bool,
}

impl Default for LineBreakSet {
    fn default() -> Self {
        Self {
            eol: true,
            dollar: true,
            bang: false,
        }
    }
}

impl LineBreakSet {
    pub fn none() -> Self {
        Self {
            eol: false,
            dollar: false,
            bang: false,
        }
    }
}

impl FromStr for LineBreakSet {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut set = LineBreakSet::none();
        for token in s.split_whitespace() {
            match token {
                "<EOL>" => set.eol = true,
                "$" => set.dollar = true,
                "!" => set.bang = true,
                "<none>" => set = LineBreakSet::none(),
                other => bail!("Invalid linebreak symbol \"{}\"", other),
            }
        }
        Ok(set)
    }
}

impl fmt::Display for LineBreakSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.eol {
            parts.push("<EOL>");
        }
        if self.dollar {
            parts.push("$");
        }
        if self.bang {
            parts.push("!");
        }
        if parts.is_empty() {
            parts.push("<none>");
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// Parser settings. Directives met while parsing update a copy of these
/// for the rest of the file header, tune or tune body they occur in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParserOptions {
    pub linebreaks: LineBreakSet,
    /// `!` for `!trill!` or `+` for `+trill+`.
    pub decoration_delimiter: char,
    pub propagate_accidentals: AccidentalPropagation,
    /// Directory `abc-include` paths are resolved against.
    #[serde(skip)]
    pub include_dir: Option<PathBuf>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            linebreaks: LineBreakSet::default(),
            decoration_delimiter: '!',
            propagate_accidentals: AccidentalPropagation::default(),
            include_dir: None,
        }
    }
}

impl ParserOptions {
    /// Applies a directive that changes how later lines are read.
    /// Returns `true` when the directive was a parser setting.
    pub fn apply(&mut self, instruction: &Instruction) -> bool {
        match instruction {
            Instruction::LineBreak(set) => self.linebreaks = *set,
            Instruction::Decoration(delimiter) => self.decoration_delimiter = *delimiter,
            Instruction::PropagateAccidentals(policy) => self.propagate_accidentals = *policy,
            _ => return false,
        }
        true
    }

    /// `!` ends a score line only when it cannot open a decoration.
    pub fn bang_is_linebreak(&self) -> bool {
        self.linebreaks.bang && self.decoration_delimiter != '!'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linebreak_set() {
        let set: LineBreakSet = "<EOL> $".parse().unwrap();
        assert_eq!(set, LineBreakSet::default());
        let set: LineBreakSet = "<none>".parse().unwrap();
        assert_eq!(set, LineBreakSet::none());
        assert_eq!(set.to_string(), "<none>");
        let set: LineBreakSet = "!".parse().unwrap();
        assert!(set.bang && !set.eol);
        assert!("<EOF>".parse::<LineBreakSet>().is_err());
    }

    #[test]
    fn test_apply_directives() {
        let mut options = ParserOptions::default();
        assert!(options.apply(&Instruction::Decoration('+')));
        assert!(options.apply(&Instruction::LineBreak("!".parse().unwrap())));
        assert!(options.bang_is_linebreak());
        assert!(options.apply(&Instruction::PropagateAccidentals(
            AccidentalPropagation::Octave
        )));
        assert_eq!(
            options.propagate_accidentals,
            AccidentalPropagation::Octave
        );
        assert!(!options.apply(&Instruction::AbcCharset("utf-8".to_string())));
    }
}
