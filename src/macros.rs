//! m: macro expansion, applied to music lines before they are tokenized.

use crate::types::pitch::{NOTE_LETTERS, Pitch, letter_index};
use anyhow::{Result, bail};
use regex::Regex;

/// A bare pitch, as matched by `n` in a transposing macro target.
const PITCH_PATTERN: &str = "([A-Ga-g][,']*)";

#[derive(Debug, Clone)]
enum MacroKind {
    Static,
    Transposing(Regex),
}

#[derive(Debug, Clone)]
pub struct Macro {
    pub target: String,
    pub replacement: String,
    kind: MacroKind,
}

impl Macro {
    pub fn new(target: &str, replacement: &str) -> Result<Self> {
        if target.is_empty() {
            bail!("Empty macro target");
        }
        if !target.contains('n') {
            return Ok(Self {
                target: target.to_string(),
                replacement: replacement.to_string(),
                kind: MacroKind::Static,
            });
        }
        if target.contains(['^', '_', '=']) || replacement.contains(['^', '_', '=']) {
            bail!("Transposing macro \"{}\" may not contain accidentals", target);
        }
        let mut pattern = String::from("^");
        let mut captured = false;
        for c in target.chars() {
            if c == 'n' {
                if captured {
                    pattern.push_str("[A-Ga-g][,']*");
                } else {
                    pattern.push_str(PITCH_PATTERN);
                    captured = true;
                }
            } else {
                pattern.push_str(&regex::escape(&c.to_string()));
            }
        }
        Ok(Self {
            target: target.to_string(),
            replacement: replacement.to_string(),
            kind: MacroKind::Transposing(Regex::new(&pattern)?),
        })
    }

    /// Length of the match at the start of `text` and its expansion.
    fn expand_at(&self, text: &str) -> Option<(usize, String)> {
        match &self.kind {
            MacroKind::Static => text
                .starts_with(&self.target)
                .then(|| (self.target.len(), self.replacement.clone())),
            MacroKind::Transposing(re) => {
                let caps = re.captures(text)?;
                let whole = caps.get(0)?;
                let pitch = caps.get(1)?.as_str();
                Some((whole.end(), transpose_replacement(&self.replacement, pitch)?))
            }
        }
    }
}

/// Writes a replacement in which letters `h` to `z` stand for the pitch
/// that many diatonic steps away from the matched `n`.
fn transpose_replacement(replacement: &str, pitch: &str) -> Option<String> {
    let mut chars = pitch.chars();
    let letter = chars.next()?;
    let base = Pitch::from_letter(letter, chars.as_str(), None);
    let index = letter_index(base.note)?;

    let mut out = String::new();
    for c in replacement.chars() {
        if ('h'..='z').contains(&c) {
            let steps = index + (c as i32 - 'n' as i32);
            let note = NOTE_LETTERS.chars().nth(steps.rem_euclid(7) as usize)?;
            let shifted = Pitch::new(note, base.octave + steps.div_euclid(7), None);
            out.push_str(&shifted.letter_text());
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Macros in effect for one tune. Later definitions with the same target
/// replace earlier ones.
#[derive(Debug, Clone, Default)]
pub struct MacroSet {
    macros: Vec<Macro>,
}

impl MacroSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn define(&mut self, target: &str, replacement: &str) -> Result<()> {
        let definition = Macro::new(target, replacement)?;
        match self.macros.iter_mut().find(|m| m.target == target) {
            Some(existing) => *existing = definition,
            None => self.macros.push(definition),
        }
        Ok(())
    }

    /// Expands every macro occurrence in one left-to-right pass; expanded
    /// text is not scanned again.
    pub fn expand(&self, line: &str) -> String {
        if self.macros.is_empty() {
            return line.to_string();
        }
        let mut out = String::with_capacity(line.len());
        let mut pos = 0;
        'scan: while pos < line.len() {
            let rest = &line[pos..];
            for m in self.macros.iter().rev() {
                if let Some((len, expansion)) = m.expand_at(rest) {
                    if len > 0 {
                        out.push_str(&expansion);
                        pos += len;
                        continue 'scan;
                    }
                }
            }
            let Some(c) = rest.chars().next() else {
                break;
            };
            out.push(c);
            pos += c.len_utf8();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(defs: &[(&str, &str)], line: &str) -> String {
        let mut set = MacroSet::new();
        for (target, replacement) in defs {
            set.define(target, replacement).unwrap();
        }
        set.expand(line)
    }

    #[test]
    fn test_static_macro() {
        assert_eq!(expand(&[("~G3", "G{A}G{F}G")], "|~G3 B|"), "|G{A}G{F}G B|");
        assert_eq!(expand(&[("U", "!upbow!")], "UAB"), "!upbow!AB");
    }

    #[test]
    fn test_transposing_macro() {
        assert_eq!(expand(&[("~n2", "{o}n{m}n")], "~g2"), "{a}g{f}g");
        assert_eq!(expand(&[("~n2", "{o}n{m}n")], "~B2 ~c'2"), "{c}B{A}B {d'}c'{b}c'");
        assert_eq!(expand(&[("Tn", "p")], "TC,"), "E,");
        assert!(Macro::new("~n", "^n").is_err());
    }

    #[test]
    fn test_expanded_text_is_not_rescanned() {
        assert_eq!(expand(&[("A", "AB")], "AA"), "ABAB");
    }

    #[test]
    fn test_later_definition_wins() {
        let mut set = MacroSet::new();
        set.define("~G", "GAG").unwrap();
        set.define("~G", "{A}G").unwrap();
        assert_eq!(set.expand("~G"), "{A}G");
    }
}
