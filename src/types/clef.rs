use anyhow::{Result, bail};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClefKind {
    Treble,
    Alto,
    Tenor,
    Bass,
    Soprano,
    MezzoSoprano,
    Baritone,
    Percussion,
    None,
}

impl ClefKind {
    /// Staff line the clef sits on, counted from the bottom.
    pub fn default_line(&self) -> u8 {
        match self {
            ClefKind::Treble => 2,
            ClefKind::Alto | ClefKind::Percussion => 3,
            ClefKind::Tenor | ClefKind::Bass => 4,
            ClefKind::Soprano => 1,
            ClefKind::MezzoSoprano => 2,
            ClefKind::Baritone => 5,
            ClefKind::None => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClefKind::Treble => "treble",
            ClefKind::Alto => "alto",
            ClefKind::Tenor => "tenor",
            ClefKind::Bass => "bass",
            ClefKind::Soprano => "soprano",
            ClefKind::MezzoSoprano => "mezzosoprano",
            ClefKind::Baritone => "baritone",
            ClefKind::Percussion => "perc",
            ClefKind::None => "none",
        }
    }
}

impl FromStr for ClefKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "treble" | "G" | "g" => ClefKind::Treble,
            "alto" | "C" | "c" => ClefKind::Alto,
            "tenor" => ClefKind::Tenor,
            "bass" | "F" | "f" => ClefKind::Bass,
            "soprano" => ClefKind::Soprano,
            "mezzosoprano" | "mezzo" => ClefKind::MezzoSoprano,
            "baritone" => ClefKind::Baritone,
            "perc" | "percussion" | "P" => ClefKind::Percussion,
            "none" => ClefKind::None,
            _ => bail!("Unknown clef \"{}\"", s),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clef {
    pub kind: ClefKind,
    pub line: u8,
    /// Octave shift from a `+8`/`-8` suffix or an `octave=` attribute.
    pub octave: i32,
    /// Playback transposition in semitones.
    pub transpose: i32,
    /// Pitch written on the middle staff line, if overridden.
    pub middle: Option<String>,
    pub stafflines: u8,
}

impl Default for Clef {
    fn default() -> Self {
        Self::new(ClefKind::Treble)
    }
}

impl Clef {
    pub fn new(kind: ClefKind) -> Self {
        Self {
            kind,
            line: kind.default_line(),
            octave: 0,
            transpose: 0,
            middle: None,
            stafflines: 5,
        }
    }

    /// Parses a clef name with an optional octave suffix, e.g. `treble-8`.
    pub fn parse_name(s: &str) -> Result<Self> {
        let (name, shift) = match s.find(['+', '-']) {
            Some(idx) => {
                let shift = match &s[idx..] {
                    "+8" => 1,
                    "-8" => -1,
                    "+15" => 2,
                    "-15" => -2,
                    other => bail!("Invalid clef octave suffix \"{}\"", other),
                };
                (&s[..idx], shift)
            }
            None => (s, 0),
        };
        // A trailing digit overrides the staff line, as in `C3` or `F4`.
        let (name, line) = match name.char_indices().last() {
            Some((idx, c)) if c.is_ascii_digit() && idx > 0 => {
                (&name[..idx], c.to_digit(10).map(|d| d as u8))
            }
            _ => (name, None),
        };
        let kind: ClefKind = name.parse()?;
        let mut clef = Clef::new(kind);
        clef.octave = shift;
        if let Some(line) = line {
            clef.line = line;
        }
        Ok(clef)
    }

    /// Semitone offset applied to written pitches under this clef.
    pub fn height_offset(&self) -> i32 {
        self.octave * 12 + self.transpose
    }
}

impl fmt::Display for Clef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.name())?;
        match self.octave {
            1 => write!(f, "+8"),
            -1 => write!(f, "-8"),
            2 => write!(f, "+15"),
            -2 => write!(f, "-15"),
            _ => Ok(()),
        }
    }
}
