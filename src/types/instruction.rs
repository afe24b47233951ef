use crate::config::{AccidentalPropagation, LineBreakSet};
use anyhow::{Result, anyhow, bail};
use serde::Serialize;

/// An `I:` field or `%%` stylesheet directive. Both spellings parse to the
/// same value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Instruction {
    LineBreak(LineBreakSet),
    Decoration(char),
    PropagateAccidentals(AccidentalPropagation),
    Staves(Staves),
    MidiVoice(MidiVoice),
    MidiProgram { channel: Option<u8>, program: u8 },
    MidiChordProgram(u8),
    AbcInclude(String),
    AbcCharset(String),
    Other { name: String, value: String },
}

impl Instruction {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (name, value) = match text.split_once(char::is_whitespace) {
            Some((n, v)) => (n, v.trim()),
            None => (text, ""),
        };
        if name.is_empty() {
            bail!("Empty directive");
        }

        Ok(match name {
            "linebreak" => Instruction::LineBreak(value.parse()?),
            "decoration" => match value {
                "!" => Instruction::Decoration('!'),
                "+" => Instruction::Decoration('+'),
                _ => bail!("Invalid decoration delimiter \"{}\"", value),
            },
            "propagate-accidentals" => Instruction::PropagateAccidentals(value.parse()?),
            "score" => Instruction::Staves(Staves::parse(value, StavesKind::Score)?),
            "staves" => Instruction::Staves(Staves::parse(value, StavesKind::Staves)?),
            "MIDI" => parse_midi(value)?,
            "abc-include" => Instruction::AbcInclude(value.to_string()),
            "abc-charset" => Instruction::AbcCharset(value.to_string()),
            _ => Instruction::Other {
                name: name.to_string(),
                value: value.to_string(),
            },
        })
    }

    /// Identity used when a later directive replaces an earlier one.
    pub fn key(&self) -> String {
        match self {
            Instruction::LineBreak(_) => "linebreak".to_string(),
            Instruction::Decoration(_) => "decoration".to_string(),
            Instruction::PropagateAccidentals(_) => "propagate-accidentals".to_string(),
            Instruction::Staves(_) => "score".to_string(),
            Instruction::MidiVoice(v) => {
                format!("MIDI voice {}", v.voice.as_deref().unwrap_or(""))
            }
            Instruction::MidiProgram { channel, .. } => match channel {
                Some(ch) => format!("MIDI program {}", ch),
                None => "MIDI program".to_string(),
            },
            Instruction::MidiChordProgram(_) => "MIDI chordprog".to_string(),
            Instruction::AbcInclude(path) => format!("abc-include {}", path),
            Instruction::AbcCharset(_) => "abc-charset".to_string(),
            Instruction::Other { name, .. } => name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MidiVoice {
    /// Voice the assignment is for. `None` means the voice it occurs in.
    pub voice: Option<String>,
    pub instrument: Option<u8>,
    pub bank: Option<u8>,
    pub mute: bool,
}

fn parse_u8(s: &str, what: &str) -> Result<u8> {
    s.parse()
        .map_err(|_| anyhow!("Invalid MIDI {} \"{}\"", what, s))
}

fn parse_midi(value: &str) -> Result<Instruction> {
    let mut parts = value.split_whitespace();
    let command = parts.next().unwrap_or("");
    let args: Vec<&str> = parts.collect();
    match command {
        "voice" => {
            let mut voice = MidiVoice::default();
            for arg in args {
                if let Some((k, v)) = arg.split_once('=') {
                    match k {
                        "instrument" => voice.instrument = Some(parse_u8(v, "instrument")?),
                        "bank" => voice.bank = Some(parse_u8(v, "bank")?),
                        _ => bail!("Invalid MIDI voice attribute \"{}\"", arg),
                    }
                } else if arg == "mute" {
                    voice.mute = true;
                } else if voice.voice.is_none() {
                    voice.voice = Some(arg.to_string());
                } else {
                    bail!("Invalid MIDI voice argument \"{}\"", arg);
                }
            }
            Ok(Instruction::MidiVoice(voice))
        }
        "program" => match args.as_slice() {
            [program] => Ok(Instruction::MidiProgram {
                channel: None,
                program: parse_u8(program, "program")?,
            }),
            [channel, program, ..] => Ok(Instruction::MidiProgram {
                channel: Some(parse_u8(channel, "channel")?),
                program: parse_u8(program, "program")?,
            }),
            [] => bail!("MIDI program requires a program number"),
        },
        "chordprog" => match args.first() {
            Some(program) => Ok(Instruction::MidiChordProgram(parse_u8(program, "program")?)),
            None => bail!("MIDI chordprog requires a program number"),
        },
        _ => Ok(Instruction::Other {
            name: "MIDI".to_string(),
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StavesKind {
    Score,
    Staves,
}

/// One staff of a `%%score` layout.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Staff {
    /// Voices printed on this staff; more than one for a `( )` group.
    pub voices: Vec<String>,
    /// Index of the `{ }` group this staff belongs to.
    pub brace: Option<usize>,
    /// Index of the `[ ]` group this staff belongs to.
    pub bracket: Option<usize>,
    /// Bar lines are drawn through to the next staff.
    pub continue_bar_lines: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Staves {
    pub kind: StavesKind,
    pub staves: Vec<Staff>,
}

impl Staves {
    pub fn parse(s: &str, kind: StavesKind) -> Result<Self> {
        let mut staves: Vec<Staff> = Vec::new();
        let mut brace: Option<usize> = None;
        let mut bracket: Option<usize> = None;
        let mut braces = 0;
        let mut brackets = 0;
        let mut group: Option<Vec<String>> = None;
        let mut chars = s.chars().peekable();

        let push_staff = |staves: &mut Vec<Staff>, voices: Vec<String>, brace, bracket| {
            staves.push(Staff {
                voices,
                brace,
                bracket,
                continue_bar_lines: false,
            });
        };

        while let Some(c) = chars.next() {
            match c {
                c if c.is_whitespace() => {}
                '(' => {
                    if group.is_some() {
                        bail!("Nested ( in score \"{}\"", s);
                    }
                    group = Some(Vec::new());
                }
                ')' => {
                    let voices = group
                        .take()
                        .ok_or_else(|| anyhow!("Unbalanced ) in score \"{}\"", s))?;
                    push_staff(&mut staves, voices, brace, bracket);
                }
                '{' => {
                    brace = Some(braces);
                    braces += 1;
                }
                '}' => brace = None,
                '[' => {
                    bracket = Some(brackets);
                    brackets += 1;
                }
                ']' => bracket = None,
                '|' => {
                    if let Some(last) = staves.last_mut() {
                        last.continue_bar_lines = true;
                    }
                }
                _ => {
                    let mut id = String::from(c);
                    while let Some(&next) = chars.peek() {
                        if next.is_whitespace() || "(){}[]|".contains(next) {
                            break;
                        }
                        id.push(next);
                        chars.next();
                    }
                    let id = id.trim_start_matches('*').to_string();
                    match group.as_mut() {
                        Some(voices) => voices.push(id),
                        None => push_staff(&mut staves, vec![id], brace, bracket),
                    }
                }
            }
        }
        if group.is_some() {
            bail!("Unbalanced ( in score \"{}\"", s);
        }
        Ok(Self { kind, staves })
    }

    pub fn staff_of(&self, voice: &str) -> Option<usize> {
        self.staves
            .iter()
            .position(|staff| staff.voices.iter().any(|v| v == voice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directives() {
        assert_eq!(
            Instruction::parse("decoration +").unwrap(),
            Instruction::Decoration('+')
        );
        assert_eq!(
            Instruction::parse("propagate-accidentals octave").unwrap(),
            Instruction::PropagateAccidentals(AccidentalPropagation::Octave)
        );
        assert_eq!(
            Instruction::parse("abc-include common.abh").unwrap(),
            Instruction::AbcInclude("common.abh".to_string())
        );
        assert_eq!(
            Instruction::parse("pagewidth 21cm").unwrap(),
            Instruction::Other {
                name: "pagewidth".to_string(),
                value: "21cm".to_string()
            }
        );
        assert!(Instruction::parse("decoration #").is_err());
        assert!(Instruction::parse("propagate-accidentals always").is_err());
    }

    #[test]
    fn test_parse_midi() {
        let i = Instruction::parse("MIDI voice Tenor instrument=66 bank=1 mute").unwrap();
        assert_eq!(
            i,
            Instruction::MidiVoice(MidiVoice {
                voice: Some("Tenor".to_string()),
                instrument: Some(66),
                bank: Some(1),
                mute: true,
            })
        );
        assert_eq!(i.key(), "MIDI voice Tenor");

        assert_eq!(
            Instruction::parse("MIDI program 2 73").unwrap(),
            Instruction::MidiProgram {
                channel: Some(2),
                program: 73
            }
        );
        assert_eq!(
            Instruction::parse("MIDI chordprog 24").unwrap(),
            Instruction::MidiChordProgram(24)
        );
        assert!(Instruction::parse("MIDI voice instrument=x").is_err());
    }

    #[test]
    fn test_parse_score() {
        let staves = Staves::parse("(S A) | {RH LH} [T1 T2]", StavesKind::Score).unwrap();
        assert_eq!(staves.staves.len(), 5);
        assert_eq!(staves.staves[0].voices, vec!["S", "A"]);
        assert!(staves.staves[0].continue_bar_lines);
        assert_eq!(staves.staves[1].brace, Some(0));
        assert_eq!(staves.staves[2].brace, Some(0));
        assert_eq!(staves.staves[3].bracket, Some(0));
        assert_eq!(staves.staves[3].brace, None);
        assert_eq!(staves.staff_of("A"), Some(0));
        assert_eq!(staves.staff_of("T2"), Some(4));
        assert!(Staves::parse("(S A", StavesKind::Staves).is_err());
    }
}
