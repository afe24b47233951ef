use crate::types::duration::Duration;
use crate::types::field::Field;
use crate::types::pitch::Pitch;
use crate::types::unit::{
    Annotation, ChordSymbol, Decoration, Embellishment, Lyric, MusicUnit, TupletMarker, UnitState,
};
use serde::Serialize;

/// Index of an element in its tune's item list.
pub type ElementId = usize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub pitch: Pitch,
    pub unit: UnitState,
}

impl Note {
    pub fn new(pitch: Pitch, specified_length: Duration) -> Self {
        Self {
            pitch,
            unit: UnitState::new(specified_length),
        }
    }

    pub fn height(&self) -> i32 {
        self.pitch.height()
    }
}

impl MusicUnit for Note {
    fn unit(&self) -> &UnitState {
        &self.unit
    }
    fn unit_mut(&mut self) -> &mut UnitState {
        &mut self.unit
    }
    fn is_alignment_target(&self) -> bool {
        true
    }
    fn pitches(&self) -> Vec<&Pitch> {
        vec![&self.pitch]
    }
    fn pitches_mut(&mut self) -> Vec<&mut Pitch> {
        vec![&mut self.pitch]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chord {
    pub notes: Vec<Note>,
    pub unit: UnitState,
}

impl Chord {
    /// Copies the chord's resolved length factors onto its member notes so
    /// that each member reports the chord's duration.
    pub fn sync_members(&mut self) {
        let unit = &self.unit;
        for note in &mut self.notes {
            let member = &mut note.unit;
            member.unit_note_length = unit.unit_note_length;
            member.broken_rhythm = unit.broken_rhythm;
            member.tuplet_ratio = unit.tuplet_ratio;
            member.chord_length = unit.specified_length / member.specified_length;
        }
    }
}

impl MusicUnit for Chord {
    fn unit(&self) -> &UnitState {
        &self.unit
    }
    fn unit_mut(&mut self) -> &mut UnitState {
        &mut self.unit
    }
    fn is_alignment_target(&self) -> bool {
        true
    }
    fn pitches(&self) -> Vec<&Pitch> {
        self.notes.iter().map(|n| &n.pitch).collect()
    }
    fn pitches_mut(&mut self) -> Vec<&mut Pitch> {
        self.notes.iter_mut().map(|n| &mut n.pitch).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rest {
    /// `x` rather than `z`.
    pub invisible: bool,
    pub unit: UnitState,
}

impl MusicUnit for Rest {
    fn unit(&self) -> &UnitState {
        &self.unit
    }
    fn unit_mut(&mut self) -> &mut UnitState {
        &mut self.unit
    }
}

/// `Z` or `X`, a rest lasting whole measures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureRest {
    pub invisible: bool,
    pub measures: u32,
    pub unit: UnitState,
}

impl MusicUnit for MeasureRest {
    fn unit(&self) -> &UnitState {
        &self.unit
    }
    fn unit_mut(&mut self) -> &mut UnitState {
        &mut self.unit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BarKind {
    Single,
    Double,
    /// `|]`
    ThinThick,
    /// `[|`
    ThickThin,
    /// `[|]` or `[]`
    Invisible,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarLine {
    pub kind: BarKind,
    /// Text as written, e.g. `:|`.
    pub text: String,
    pub repeat_end: u32,
    pub repeat_start: u32,
    /// `.|`: does not reset accidentals or stop lyric alignment.
    pub dotted: bool,
    pub embellishments: Vec<Embellishment>,
}

impl BarLine {
    pub fn parse(text: &str) -> Option<Self> {
        let dotted = text.starts_with('.');
        let body = text.trim_start_matches('.');
        if body.is_empty() {
            return None;
        }
        if body.chars().all(|c| c == ':') {
            if body.len() != 2 {
                return None;
            }
            return Some(Self {
                kind: BarKind::Double,
                text: text.to_string(),
                repeat_end: 1,
                repeat_start: 1,
                dotted,
                embellishments: Vec::new(),
            });
        }
        let repeat_end = body.chars().take_while(|c| *c == ':').count();
        let repeat_start = body.chars().rev().take_while(|c| *c == ':').count();
        let core = &body[repeat_end..body.len() - repeat_start];
        let kind = match core {
            "|" => BarKind::Single,
            "||" => BarKind::Double,
            "|]" | "||]" => BarKind::ThinThick,
            "[|" | "[||" => BarKind::ThickThin,
            "[|]" | "[]" => BarKind::Invisible,
            _ => return None,
        };
        Some(Self {
            kind,
            text: text.to_string(),
            repeat_end: repeat_end as u32,
            repeat_start: repeat_start as u32,
            dotted,
            embellishments: Vec::new(),
        })
    }
}

/// Widest range a variant ending may name.
const MAX_ENDINGS: u32 = 1000;

/// `[1`, `|2`, `:|1,3` numbered repeat endings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantEnding {
    pub text: String,
    pub endings: Vec<u32>,
}

impl VariantEnding {
    pub fn parse(text: &str) -> Option<Self> {
        let mut endings = Vec::new();
        for part in text.split(',') {
            match part.split_once('-') {
                Some((from, to)) => {
                    let from: u32 = from.parse().ok()?;
                    let to: u32 = to.parse().ok()?;
                    if to < from || to - from >= MAX_ENDINGS {
                        return None;
                    }
                    endings.extend(from..=to);
                }
                None => endings.push(part.parse().ok()?),
            }
        }
        Some(Self {
            text: text.to_string(),
            endings,
        })
    }
}

/// A token of an s: or w: line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AlignToken<T> {
    /// Moves past one note, keeping what is held over it.
    SkipNote,
    /// `*`: moves past one note with nothing attached.
    Blank,
    /// `|`: moves to the note after the next bar line.
    Bar,
    Item(T),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolLine {
    pub tokens: Vec<AlignToken<Embellishment>>,
    /// Written as a `+:` continuation of the previous s: line.
    pub continuation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LyricsLine {
    pub tokens: Vec<AlignToken<Lyric>>,
    pub continuation: bool,
}

/// `y`: extra horizontal space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spacer {
    pub specified_length: Duration,
}

/// `&` overlay delimiter; `count` consecutive `&` reach back that many bars.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayMarker {
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LineBreakSymbol {
    EndOfLine,
    Dollar,
    Bang,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineBreakMarker {
    pub symbol: LineBreakSymbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlurKind {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlurMarker {
    pub kind: SlurKind,
    pub dotted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TieMarker {
    pub dotted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BrokenDirection {
    /// `>`: first note lengthened.
    Dotted,
    /// `<`: first note shortened.
    Snapped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokenRhythm {
    pub direction: BrokenDirection,
    pub count: u32,
}

impl BrokenRhythm {
    /// Factors for the units before and after the marker.
    pub fn factors(&self) -> (Duration, Duration) {
        let short = Duration::new(1, 1i64 << self.count.min(16));
        let long = Duration::from_integer(2) - short;
        match self.direction {
            BrokenDirection::Dotted => (long, short),
            BrokenDirection::Snapped => (short, long),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Element {
    Note(Note),
    Chord(Chord),
    Rest(Rest),
    MeasureRest(MeasureRest),
    BarLine(BarLine),
    Field(Field),
    Decoration(Decoration),
    Annotation(Annotation),
    ChordSymbol(ChordSymbol),
    Tuplet(TupletMarker),
    VariantEnding(VariantEnding),
    SymbolLine(SymbolLine),
    LyricsLine(LyricsLine),
    Spacer(Spacer),
    Overlay(OverlayMarker),
    LineBreak(LineBreakMarker),
    Slur(SlurMarker),
    Tie(TieMarker),
    BrokenRhythm(BrokenRhythm),
    /// Whitespace between music units, which ends a beam group.
    Space,
}

impl Element {
    pub fn as_unit(&self) -> Option<&dyn MusicUnit> {
        match self {
            Element::Note(n) => Some(n),
            Element::Chord(c) => Some(c),
            Element::Rest(r) => Some(r),
            Element::MeasureRest(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_unit_mut(&mut self) -> Option<&mut dyn MusicUnit> {
        match self {
            Element::Note(n) => Some(n),
            Element::Chord(c) => Some(c),
            Element::Rest(r) => Some(r),
            Element::MeasureRest(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_unit(&self) -> bool {
        self.as_unit().is_some()
    }

    pub fn as_note(&self) -> Option<&Note> {
        match self {
            Element::Note(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bar_line(&self) -> Option<&BarLine> {
        match self {
            Element::BarLine(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&Field> {
        match self {
            Element::Field(f) => Some(f),
            _ => None,
        }
    }

    /// Undotted bar line, the boundary used by accidentals and alignment.
    pub fn is_hard_bar(&self) -> bool {
        matches!(self, Element::BarLine(b) if !b.dotted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::duration::duration;

    #[test]
    fn test_bar_line_parse() {
        let bar = BarLine::parse(":|").unwrap();
        assert_eq!(bar.kind, BarKind::Single);
        assert_eq!((bar.repeat_end, bar.repeat_start), (1, 0));

        let bar = BarLine::parse("::").unwrap();
        assert_eq!((bar.repeat_end, bar.repeat_start), (1, 1));

        let bar = BarLine::parse(":||:").unwrap();
        assert_eq!(bar.kind, BarKind::Double);
        assert_eq!((bar.repeat_end, bar.repeat_start), (1, 1));

        assert_eq!(BarLine::parse("|]").unwrap().kind, BarKind::ThinThick);
        assert_eq!(BarLine::parse("[|").unwrap().kind, BarKind::ThickThin);
        assert_eq!(BarLine::parse("[|]").unwrap().kind, BarKind::Invisible);
        assert!(BarLine::parse(".|").unwrap().dotted);
        assert!(BarLine::parse("|x").is_none());
    }

    #[test]
    fn test_chord_members_share_duration() {
        let mut chord = Chord {
            notes: vec![
                Note::new(Pitch::new('C', 0, None), duration(2, 1)),
                Note::new(Pitch::new('E', 0, None), duration(1, 1)),
            ],
            unit: UnitState::new(duration(4, 1)),
        };
        chord.unit.unit_note_length = duration(1, 8);
        chord.unit.tuplet_ratio = duration(2, 3);
        chord.sync_members();
        assert_eq!(chord.duration(), duration(1, 3));
        for note in &chord.notes {
            assert_eq!(note.duration(), chord.duration());
        }
    }

    #[test]
    fn test_variant_ending_parse() {
        assert_eq!(VariantEnding::parse("1").unwrap().endings, vec![1]);
        assert_eq!(
            VariantEnding::parse("1,3-5").unwrap().endings,
            vec![1, 3, 4, 5]
        );
        assert!(VariantEnding::parse("3-1").is_none());
        assert!(VariantEnding::parse("1-4000000000").is_none());
        assert_eq!(VariantEnding::parse("1-1000").unwrap().endings.len(), 1000);
        assert!(VariantEnding::parse("a").is_none());
    }

    #[test]
    fn test_broken_rhythm_factors() {
        let dotted = BrokenRhythm {
            direction: BrokenDirection::Dotted,
            count: 1,
        };
        assert_eq!(dotted.factors(), (duration(3, 2), duration(1, 2)));
        let snapped = BrokenRhythm {
            direction: BrokenDirection::Snapped,
            count: 2,
        };
        assert_eq!(snapped.factors(), (duration(1, 4), duration(7, 4)));
        for count in 1..5 {
            let marker = BrokenRhythm {
                direction: BrokenDirection::Dotted,
                count,
            };
            let (a, b) = marker.factors();
            assert_eq!(a + b, duration(2, 1));
        }
    }
}
