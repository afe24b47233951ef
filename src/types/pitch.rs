use crate::types::clef::Clef;
use anyhow::{Result, bail};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const NOTE_LETTERS: &str = "CDEFGAB";

/// Semitones above C for each natural note letter.
pub fn semitone(note: char) -> i32 {
    match note.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => 0,
    }
}

/// Position of a letter in the diatonic scale starting at C.
pub fn letter_index(note: char) -> Option<i32> {
    NOTE_LETTERS
        .find(note.to_ascii_uppercase())
        .map(|idx| idx as i32)
}

pub fn parse_accidental(s: &str) -> Option<i8> {
    match s {
        "^" => Some(1),
        "^^" => Some(2),
        "_" => Some(-1),
        "__" => Some(-2),
        "=" => Some(0),
        _ => None,
    }
}

pub fn accidental_symbol(value: i8) -> &'static str {
    match value {
        2 => "^^",
        1 => "^",
        0 => "=",
        -1 => "_",
        -2 => "__",
        _ => "",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pitch {
    /// Upper-case note letter.
    pub note: char,
    /// Octave relative to the middle-C octave, which is 0 (`C` to `B`).
    pub octave: i32,
    /// Accidental written in front of the note.
    pub accidental: Option<i8>,
    /// Accidental in effect after key signature and bar-local accidentals.
    pub resolved_accidental: Option<i8>,
    pub clef: Option<Clef>,
}

impl Pitch {
    pub fn new(note: char, octave: i32, accidental: Option<i8>) -> Self {
        Self {
            note: note.to_ascii_uppercase(),
            octave,
            accidental,
            resolved_accidental: None,
            clef: None,
        }
    }

    /// Builds a pitch from a written letter and its octave marks.
    pub fn from_letter(letter: char, marks: &str, accidental: Option<i8>) -> Self {
        let mut octave = if letter.is_ascii_lowercase() { 1 } else { 0 };
        for c in marks.chars() {
            match c {
                '\'' => octave += 1,
                ',' => octave -= 1,
                _ => {}
            }
        }
        Self::new(letter, octave, accidental)
    }

    pub fn accidental_value(&self) -> i8 {
        self.resolved_accidental.or(self.accidental).unwrap_or(0)
    }

    /// Semitones relative to middle C, including the clef's octave shift
    /// and transposition.
    pub fn height(&self) -> i32 {
        let offset = self.clef.as_ref().map_or(0, |c| c.height_offset());
        semitone(self.note) + 12 * self.octave + self.accidental_value() as i32 + offset
    }

    /// ABC spelling of the letter and octave marks, without accidental.
    pub fn letter_text(&self) -> String {
        let mut s = String::new();
        if self.octave >= 1 {
            s.push(self.note.to_ascii_lowercase());
            for _ in 1..self.octave {
                s.push('\'');
            }
        } else {
            s.push(self.note);
            for _ in self.octave..0 {
                s.push(',');
            }
        }
        s
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(acc) = self.accidental {
            write!(f, "{}", accidental_symbol(acc))?;
        }
        write!(f, "{}", self.letter_text())
    }
}

impl FromStr for Pitch {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let letter_pos = s
            .find(|c: char| c.is_ascii_alphabetic())
            .ok_or_else(|| anyhow::anyhow!("Invalid pitch \"{}\"", s))?;
        let accidental = if letter_pos == 0 {
            None
        } else {
            match parse_accidental(&s[..letter_pos]) {
                Some(acc) => Some(acc),
                None => bail!("Invalid accidental in \"{}\"", s),
            }
        };
        let letter = s[letter_pos..].chars().next().unwrap_or(' ');
        if letter_index(letter).is_none() {
            bail!("Invalid note letter in \"{}\"", s);
        }
        let marks = &s[letter_pos + 1..];
        if !marks.chars().all(|c| c == '\'' || c == ',') {
            bail!("Invalid octave marks in \"{}\"", s);
        }
        Ok(Self::from_letter(letter, marks, accidental))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pitch() {
        let p: Pitch = "^c'".parse().unwrap();
        assert_eq!(p.note, 'C');
        assert_eq!(p.octave, 2);
        assert_eq!(p.accidental, Some(1));
        assert_eq!(p.height(), 25);

        let p: Pitch = "B,,".parse().unwrap();
        assert_eq!(p.octave, -2);
        assert_eq!(p.height(), 11 - 24);

        assert!("H".parse::<Pitch>().is_err());
        assert!("^^^c".parse::<Pitch>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!("_e".parse::<Pitch>().unwrap().to_string(), "_e");
        assert_eq!("c''".parse::<Pitch>().unwrap().to_string(), "c''");
        assert_eq!("C,".parse::<Pitch>().unwrap().to_string(), "C,");
        assert_eq!("=G".parse::<Pitch>().unwrap().to_string(), "=G");
    }

    #[test]
    fn test_height_uses_clef() {
        let mut p: Pitch = "c".parse().unwrap();
        assert_eq!(p.height(), 12);
        p.clef = Some(Clef::parse_name("treble-8").unwrap());
        assert_eq!(p.height(), 0);
    }
}
