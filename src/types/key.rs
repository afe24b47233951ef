use crate::error::DiagnosticKind;
use crate::types::clef::Clef;
use crate::types::pitch::{letter_index, parse_accidental};
use anyhow::{Result, anyhow, bail};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Note letter to accidental value (-2..=2).
pub type Signature = BTreeMap<char, i8>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Mode {
    #[default]
    Major,
    Minor,
    Ionian,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Locrian,
}

impl Mode {
    pub fn short_name(&self) -> &'static str {
        match self {
            Mode::Major | Mode::Ionian => "",
            Mode::Minor | Mode::Aeolian => "m",
            Mode::Mixolydian => "mix",
            Mode::Dorian => "dor",
            Mode::Phrygian => "phr",
            Mode::Lydian => "lyd",
            Mode::Locrian => "loc",
        }
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        if lower == "m" {
            return Ok(Mode::Minor);
        }
        let Some(prefix) = lower.get(..3) else {
            bail!("Unknown mode \"{}\"", s);
        };
        Ok(match prefix {
            "maj" => Mode::Major,
            "min" => Mode::Minor,
            "ion" => Mode::Ionian,
            "dor" => Mode::Dorian,
            "phr" => Mode::Phrygian,
            "lyd" => Mode::Lydian,
            "mix" => Mode::Mixolydian,
            "aeo" => Mode::Aeolian,
            "loc" => Mode::Locrian,
            _ => bail!("Unknown mode \"{}\"", s),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Tonic {
    /// Letter with optional `#` or `b`, e.g. `F#`.
    Note(String),
    None,
    /// `K:HP`: bagpipe music written without a signature.
    HighlandPipes,
    /// `K:Hp`: bagpipe signature with sharp F and C and natural G.
    HighlandPipesMarked,
}

/// Circle of fifths from seven sharps down to seven flats. Columns are
/// major, minor, mixolydian, dorian, phrygian, lydian, locrian.
const SIGNATURE_TABLE: [[&str; 7]; 15] = [
    ["C#", "A#m", "G#mix", "D#dor", "E#phr", "F#lyd", "B#loc"],
    ["F#", "D#m", "C#mix", "G#dor", "A#phr", "Blyd", "E#loc"],
    ["B", "G#m", "F#mix", "C#dor", "D#phr", "Elyd", "A#loc"],
    ["E", "C#m", "Bmix", "F#dor", "G#phr", "Alyd", "D#loc"],
    ["A", "F#m", "Emix", "Bdor", "C#phr", "Dlyd", "G#loc"],
    ["D", "Bm", "Amix", "Edor", "F#phr", "Glyd", "C#loc"],
    ["G", "Em", "Dmix", "Ador", "Bphr", "Clyd", "F#loc"],
    ["C", "Am", "Gmix", "Ddor", "Ephr", "Flyd", "Bloc"],
    ["F", "Dm", "Cmix", "Gdor", "Aphr", "Bblyd", "Eloc"],
    ["Bb", "Gm", "Fmix", "Cdor", "Dphr", "Eblyd", "Aloc"],
    ["Eb", "Cm", "Bbmix", "Fdor", "Gphr", "Ablyd", "Dloc"],
    ["Ab", "Fm", "Ebmix", "Bbdor", "Cphr", "Dblyd", "Gloc"],
    ["Db", "Bbm", "Abmix", "Ebdor", "Fphr", "Gblyd", "Cloc"],
    ["Gb", "Ebm", "Dbmix", "Abdor", "Bbphr", "Cblyd", "Floc"],
    ["Cb", "Abm", "Gbmix", "Dbdor", "Ebphr", "Fblyd", "Bbloc"],
];

const SHARP_ORDER: &str = "FCGDAEB";
const FLAT_ORDER: &str = "BEADGCF";

/// Number of sharps (positive) or flats (negative) for a tonic and mode,
/// or `None` when the combination is not in the table.
pub fn fifths(tonic: &str, mode: Mode) -> Option<i32> {
    let name = format!("{}{}", tonic, mode.short_name());
    SIGNATURE_TABLE
        .iter()
        .position(|row| row.contains(&name.as_str()))
        .map(|row| 7 - row as i32)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Key {
    pub tonic: Tonic,
    pub mode: Mode,
    pub extra_accidentals: Signature,
    /// `exp`: only the extra accidentals make up the signature.
    pub explicit: bool,
    pub clef: Option<Clef>,
}

impl Default for Key {
    fn default() -> Self {
        Self::none()
    }
}

impl Key {
    pub fn none() -> Self {
        Self {
            tonic: Tonic::None,
            mode: Mode::Major,
            extra_accidentals: Signature::new(),
            explicit: false,
            clef: None,
        }
    }

    pub fn new(tonic: &str, mode: Mode) -> Self {
        Self {
            tonic: Tonic::Note(tonic.to_string()),
            mode,
            ..Self::none()
        }
    }

    /// Table signature for a tonic and mode, without extra accidentals.
    pub fn signature_for(tonic: &str, mode: Mode) -> Signature {
        let mut signature = Signature::new();
        let Some(count) = fifths(tonic, mode) else {
            log::warn!("No signature for key {}{}", tonic, mode.short_name());
            return signature;
        };
        let (order, value) = if count >= 0 {
            (SHARP_ORDER, 1)
        } else {
            (FLAT_ORDER, -1)
        };
        for note in order.chars().take(count.unsigned_abs() as usize) {
            signature.insert(note, value);
        }
        signature
    }

    pub fn signature(&self) -> Signature {
        let mut signature = if self.explicit {
            Signature::new()
        } else {
            match &self.tonic {
                Tonic::Note(t) => Self::signature_for(t, self.mode),
                Tonic::None | Tonic::HighlandPipes => Signature::new(),
                Tonic::HighlandPipesMarked => Signature::from([('F', 1), ('C', 1), ('G', 0)]),
            }
        };
        for (note, value) in &self.extra_accidentals {
            signature.insert(*note, *value);
        }
        signature
    }

    pub fn clef(&self) -> Clef {
        self.clef.clone().unwrap_or_default()
    }

    pub fn name(&self) -> String {
        match &self.tonic {
            Tonic::Note(t) => format!("{}{}", t, self.mode.short_name()),
            Tonic::None => "none".to_string(),
            Tonic::HighlandPipes => "HP".to_string(),
            Tonic::HighlandPipesMarked => "Hp".to_string(),
        }
    }

    /// Parses a K: field value. Unknown clef names and attributes are
    /// tolerated and reported through `warnings`.
    pub fn parse(s: &str, warnings: &mut Vec<DiagnosticKind>) -> Result<Self> {
        let mut key = Key::none();
        let tokens = split_key_tokens(s);
        let mut idx = 0;

        if let Some(first) = tokens.first() {
            let first = first.as_str();
            if first == "HP" {
                key.tonic = Tonic::HighlandPipes;
                idx = 1;
            } else if first == "Hp" {
                key.tonic = Tonic::HighlandPipesMarked;
                idx = 1;
            } else if first == "none" {
                idx = 1;
            } else if first.starts_with(|c: char| ('A'..='G').contains(&c)) {
                let mut tonic_len = 1;
                if first[1..].starts_with(['#', 'b']) {
                    tonic_len = 2;
                }
                key.tonic = Tonic::Note(first[..tonic_len].to_string());
                let rest = &first[tonic_len..];
                if !rest.is_empty() {
                    key.mode = rest
                        .parse()
                        .map_err(|_| anyhow!("Invalid key \"{}\"", s))?;
                }
                idx = 1;
                if rest.is_empty() {
                    if let Some(mode) = tokens.get(1).and_then(|t| t.parse::<Mode>().ok()) {
                        key.mode = mode;
                        idx = 2;
                    }
                }
            }
        }

        for token in &tokens[idx..] {
            key.apply_token(token, warnings)?;
        }
        Ok(key)
    }

    pub(crate) fn apply_token(
        &mut self,
        token: &str,
        warnings: &mut Vec<DiagnosticKind>,
    ) -> Result<()> {
        if token == "exp" {
            self.explicit = true;
            return Ok(());
        }

        if token.starts_with(['^', '_', '=']) {
            let pos = token.find(|c: char| !matches!(c, '^' | '_' | '='));
            let accidental = pos.and_then(|p| parse_accidental(&token[..p]));
            if let (Some(pos), Some(acc)) = (pos, accidental) {
                let letter = token[pos..].chars().next().unwrap_or(' ');
                if letter_index(letter).is_none() || token.len() != pos + 1 {
                    bail!("Invalid key accidental \"{}\"", token);
                }
                self.extra_accidentals
                    .insert(letter.to_ascii_uppercase(), acc);
                return Ok(());
            }
        }

        if let Some((name, value)) = token.split_once('=') {
            match name {
                "clef" => self.set_clef_name(value, warnings),
                "middle" | "m" => self.clef_mut().middle = Some(value.to_string()),
                "transpose" | "t" => {
                    self.clef_mut().transpose = value
                        .parse()
                        .map_err(|_| anyhow!("Invalid transpose value \"{}\"", value))?;
                }
                "octave" => {
                    self.clef_mut().octave = value
                        .parse()
                        .map_err(|_| anyhow!("Invalid octave value \"{}\"", value))?;
                }
                "stafflines" => {
                    self.clef_mut().stafflines = value
                        .parse()
                        .map_err(|_| anyhow!("Invalid stafflines value \"{}\"", value))?;
                }
                _ => warnings.push(DiagnosticKind::UnknownAttribute(token.to_string())),
            }
            return Ok(());
        }

        if Clef::parse_name(token).is_ok() {
            self.set_clef_name(token, warnings);
        } else {
            warnings.push(DiagnosticKind::UnknownAttribute(token.to_string()));
        }
        Ok(())
    }

    fn set_clef_name(&mut self, name: &str, warnings: &mut Vec<DiagnosticKind>) {
        match Clef::parse_name(name) {
            Ok(clef) => {
                let previous = self.clef.take();
                let mut clef = clef;
                if let Some(prev) = previous {
                    clef.middle = prev.middle;
                    clef.transpose = prev.transpose;
                    clef.stafflines = prev.stafflines;
                }
                self.clef = Some(clef);
            }
            Err(_) => {
                log::warn!("Unknown clef \"{}\", keeping default", name);
                warnings.push(DiagnosticKind::UnknownClef(name.to_string()));
            }
        }
    }

    fn clef_mut(&mut self) -> &mut Clef {
        self.clef.get_or_insert_with(Clef::default)
    }
}

/// `^f`, `_b`, `=c`: an explicit accidental token of a K: field.
pub(crate) fn is_accidental_token(token: &str) -> bool {
    let letters = token.trim_start_matches(['^', '_', '=']);
    let prefix = &token[..token.len() - letters.len()];
    parse_accidental(prefix).is_some()
        && letters.len() == 1
        && letters.chars().all(|c| letter_index(c).is_some())
}

fn split_key_tokens(s: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for raw in s.split_whitespace() {
        // `clef = bass` is written with spaces in some tunebooks.
        if raw == "=" {
            if let Some(last) = tokens.last_mut() {
                last.push_str(raw);
                continue;
            }
        }
        if tokens.last().is_some_and(|t| t.ends_with('=')) {
            if let Some(last) = tokens.last_mut() {
                last.push_str(raw);
                continue;
            }
        }
        tokens.push(raw.to_string());
    }
    tokens
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Key {
        Key::parse(s, &mut Vec::new()).unwrap()
    }

    #[test]
    fn test_signature_lookup() {
        assert_eq!(
            Key::signature_for("G", Mode::Major),
            Signature::from([('F', 1)])
        );
        assert_eq!(
            Key::signature_for("Bb", Mode::Major),
            Signature::from([('B', -1), ('E', -1)])
        );
        assert_ne!(
            Key::signature_for("C", Mode::Minor),
            Key::signature_for("C", Mode::Major)
        );
        assert_eq!(
            Key::signature_for("C", Mode::Minor),
            Key::signature_for("C", Mode::Minor)
        );
        assert_eq!(Key::signature_for("C#", Mode::Major).len(), 7);
        assert_eq!(
            Key::signature_for("Cb", Mode::Major).values().sum::<i8>(),
            -7
        );
    }

    #[test]
    fn test_modes_share_rows() {
        assert_eq!(fifths("D", Mode::Dorian), Some(0));
        assert_eq!(fifths("A", Mode::Mixolydian), Some(2));
        assert_eq!(fifths("E", Mode::Minor), fifths("E", Mode::Aeolian));
        assert_eq!(fifths("G#", Mode::Major), None);
    }

    #[test]
    fn test_parse_key() {
        let k = key("Am");
        assert_eq!(k.tonic, Tonic::Note("A".to_string()));
        assert_eq!(k.mode, Mode::Minor);

        let k = key("D dorian");
        assert_eq!(k.mode, Mode::Dorian);
        assert!(k.signature().is_empty());

        let k = key("Bbmix");
        assert_eq!(k.name(), "Bbmix");

        let k = key("D exp ^f");
        assert_eq!(k.signature(), Signature::from([('F', 1)]));

        let k = key("G ^c");
        assert_eq!(k.signature(), Signature::from([('F', 1), ('C', 1)]));

        let k = key("F =b");
        assert_eq!(k.signature(), Signature::from([('B', 0)]));
    }

    #[test]
    fn test_non_ascii_mode() {
        assert!("éé".parse::<Mode>().is_err());
        assert!("mé".parse::<Mode>().is_err());
        assert!(Key::parse("Aéé", &mut Vec::new()).is_err());
        assert!(Key::parse("G ^é", &mut Vec::new()).is_err());

        let book = crate::parse("X:1\nK:Aéé\nabc\n").unwrap();
        assert!(book
            .all_diagnostics()
            .any(|d| matches!(d.kind, DiagnosticKind::InvalidFieldValue('K', ..))));
    }

    #[test]
    fn test_parse_key_clef() {
        let k = key("G clef=bass");
        assert_eq!(k.clef().kind, crate::types::clef::ClefKind::Bass);

        let k = key("bass");
        assert_eq!(k.tonic, Tonic::None);
        assert_eq!(k.clef().kind, crate::types::clef::ClefKind::Bass);

        let k = key("C treble-8 transpose=-2");
        assert_eq!(k.clef().octave, -1);
        assert_eq!(k.clef().transpose, -2);

        let k = key("D");
        assert!(k.clef.is_none());
        assert_eq!(k.clef().kind, crate::types::clef::ClefKind::Treble);
    }

    #[test]
    fn test_unknown_clef_is_tolerated() {
        let mut warnings = Vec::new();
        let k = Key::parse("G clef=banjo", &mut warnings).unwrap();
        assert!(k.clef.is_none());
        assert_eq!(warnings, vec![DiagnosticKind::UnknownClef("banjo".to_string())]);
    }

    #[test]
    fn test_highland_pipes() {
        assert!(key("HP").signature().is_empty());
        assert_eq!(
            key("Hp").signature(),
            Signature::from([('F', 1), ('C', 1), ('G', 0)])
        );
        assert_eq!(key("none").tonic, Tonic::None);
        assert_eq!(key("").tonic, Tonic::None);
    }
}
