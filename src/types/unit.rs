use crate::types::duration::{Duration, checked_mul, one};
use crate::types::element::Element;
use crate::types::pitch::Pitch;
use crate::types::text::TextString;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Beam {
    Start,
    Middle,
    End,
}

const KNOWN_DECORATIONS: &[&str] = &[
    "trill", "trill(", "trill)", "lowermordent", "uppermordent", "mordent", "pralltriller",
    "roll", "turn", "turnx", "invertedturn", "invertedturnx", "arpeggio", ">", "accent",
    "emphasis", "fermata", "invertedfermata", "tenuto", "0", "1", "2", "3", "4", "5", "+",
    "plus", "snap", "slide", "wedge", "upbow", "downbow", "open", "thumb", "breath", "pppp",
    "ppp", "pp", "p", "mp", "mf", "f", "ff", "fff", "ffff", "sfz", "crescendo(", "<(",
    "crescendo)", "<)", "diminuendo(", ">(", "diminuendo)", ">)", "segno", "coda", "D.S.",
    "D.C.", "dacoda", "dacapo", "fine", "shortphrase", "mediumphrase", "longphrase",
    "staccato", "editorial", "courtesy", "x",
];

pub fn is_known_decoration(name: &str) -> bool {
    KNOWN_DECORATIONS.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decoration {
    /// Decoration name, e.g. `trill`. Empty for a shorthand symbol that has
    /// not been resolved against the U: table yet.
    pub name: String,
    /// Shorthand character the decoration was written with, e.g. `T`.
    pub shorthand: Option<char>,
}

impl Decoration {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            shorthand: None,
        }
    }

    pub fn shorthand(symbol: char) -> Self {
        Self {
            name: String::new(),
            shorthand: Some(symbol),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Placement {
    Above,
    Below,
    Left,
    Right,
    Free,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub placement: Placement,
    pub text: TextString,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordSymbol {
    pub text: TextString,
    pub root: Option<String>,
    pub quality: String,
    pub bass: Option<String>,
}

impl ChordSymbol {
    pub fn parse(text: &str) -> Self {
        let decoded = TextString::new(text);
        let s = decoded.as_str();
        let (main, bass) = match s.split_once('/') {
            Some((m, b)) if b.starts_with(|c: char| ('A'..='G').contains(&c)) => {
                (m, Some(b.to_string()))
            }
            _ => (s, None),
        };
        let root_len = if main.starts_with(|c: char| ('A'..='G').contains(&c)) {
            if main[1..].starts_with(['#', 'b']) { 2 } else { 1 }
        } else {
            0
        };
        Self {
            root: (root_len > 0).then(|| main[..root_len].to_string()),
            quality: main[root_len..].to_string(),
            bass,
            text: decoded,
        }
    }
}

/// Something attached to a music unit or bar line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Embellishment {
    Decoration(Decoration),
    Annotation(Annotation),
    ChordSymbol(ChordSymbol),
}

impl Embellishment {
    /// Text written between double quotes is an annotation when it starts
    /// with a placement character, otherwise a chord symbol.
    pub fn from_quoted(text: &str) -> Self {
        let placement = match text.chars().next() {
            Some('^') => Placement::Above,
            Some('_') => Placement::Below,
            Some('<') => Placement::Left,
            Some('>') => Placement::Right,
            Some('@') => Placement::Free,
            _ => return Embellishment::ChordSymbol(ChordSymbol::parse(text)),
        };
        Embellishment::Annotation(Annotation {
            placement,
            text: TextString::new(&text[1..]),
        })
    }
}

/// One syllable of a w: line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lyric {
    pub text: TextString,
    /// Followed by a hyphen, continuing the word on a later note.
    pub hyphen: bool,
    /// Number of hyphens written after the syllable.
    pub hyphen_length: usize,
    /// Number of `_` extenders after the syllable.
    pub stretch: usize,
    /// 0-based verse number, assigned at alignment.
    pub verse: usize,
}

impl Lyric {
    pub fn new(text: &str) -> Self {
        Self {
            text: TextString::new(text),
            hyphen: false,
            hyphen_length: 0,
            stretch: 0,
            verse: 0,
        }
    }

    /// Notes this syllable occupies.
    pub fn note_count(&self) -> usize {
        let hyphen_extra = if self.hyphen {
            self.hyphen_length.saturating_sub(1)
        } else {
            0
        };
        1 + self.stretch + hyphen_extra
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TupletMarker {
    pub p: u32,
    pub q: Option<u32>,
    pub r: Option<u32>,
}

impl TupletMarker {
    /// Notes in the time of `ratio * written length`.
    pub fn ratio(&self, compound: bool) -> Duration {
        let q = self.q.unwrap_or(match self.p {
            2 | 4 | 8 => 3,
            3 | 6 => 2,
            _ if compound => 3,
            _ => 2,
        });
        Duration::new(q as i64, self.p.max(1) as i64)
    }

    pub fn note_count(&self) -> u32 {
        self.r.unwrap_or(self.p)
    }
}

/// Grace notes written in `{...}` before a music unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraceNotes {
    /// `{/...}`: played as a crushed note.
    pub acciaccatura: bool,
    /// Notes, chords and broken-rhythm markers in source order.
    pub items: Vec<Element>,
}

/// Resolution state shared by every music unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitState {
    /// Multiplier written after the note, e.g. 3/2 for `a3/2`.
    pub specified_length: Duration,
    pub unit_note_length: Duration,
    pub broken_rhythm: Duration,
    pub chord_length: Duration,
    pub tuplet_ratio: Duration,
    pub tuplet: Option<TupletMarker>,
    pub tied_left: bool,
    pub tied_right: bool,
    pub tied_right_dotted: bool,
    pub start_slur: u32,
    pub start_dotted_slur: u32,
    pub end_slur: u32,
    pub beam: Option<Beam>,
    pub embellishments: Vec<Embellishment>,
    pub grace_notes: Option<GraceNotes>,
    /// Syllables by verse number.
    pub lyrics: Vec<Option<Lyric>>,
}

impl Default for UnitState {
    fn default() -> Self {
        Self::new(one())
    }
}

impl UnitState {
    pub fn new(specified_length: Duration) -> Self {
        Self {
            specified_length,
            unit_note_length: Duration::new(1, 8),
            broken_rhythm: one(),
            chord_length: one(),
            tuplet_ratio: one(),
            tuplet: None,
            tied_left: false,
            tied_right: false,
            tied_right_dotted: false,
            start_slur: 0,
            start_dotted_slur: 0,
            end_slur: 0,
            beam: None,
            embellishments: Vec::new(),
            grace_notes: None,
            lyrics: Vec::new(),
        }
    }

    /// Resolved length. A product too large to represent is logged and
    /// reported as zero.
    pub fn duration(&self) -> Duration {
        [
            self.unit_note_length,
            self.broken_rhythm,
            self.chord_length,
            self.tuplet_ratio,
        ]
        .into_iter()
        .try_fold(self.specified_length, checked_mul)
        .unwrap_or_else(|| {
            log::warn!("Length of {} is out of range", self.specified_length);
            Duration::from_integer(0)
        })
    }

    pub fn decorations(&self) -> impl Iterator<Item = &Decoration> {
        self.embellishments.iter().filter_map(|e| match e {
            Embellishment::Decoration(d) => Some(d),
            _ => None,
        })
    }

    pub fn lyric(&self, verse: usize) -> Option<&Lyric> {
        self.lyrics.get(verse).and_then(|l| l.as_ref())
    }

    pub fn set_lyric(&mut self, verse: usize, lyric: Lyric) {
        if self.lyrics.len() <= verse {
            self.lyrics.resize(verse + 1, None);
        }
        self.lyrics[verse] = Some(lyric);
    }
}

/// Capability shared by notes, chords, rests and measure rests.
pub trait MusicUnit {
    fn unit(&self) -> &UnitState;
    fn unit_mut(&mut self) -> &mut UnitState;

    fn duration(&self) -> Duration {
        self.unit().duration()
    }

    /// Notes and chords take lyrics and symbol-line attachments; rests do not.
    fn is_alignment_target(&self) -> bool {
        false
    }

    fn pitches(&self) -> Vec<&Pitch> {
        Vec::new()
    }

    fn pitches_mut(&mut self) -> Vec<&mut Pitch> {
        Vec::new()
    }
}
