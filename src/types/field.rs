use crate::types::clef::Clef;
use crate::types::duration::Duration;
use crate::types::instruction::Instruction;
use crate::types::key::Key;
use crate::types::meter::Meter;
use crate::types::tempo::Tempo;
use crate::types::text::TextString;
use serde::Serialize;

/// Voice ids are significant up to this many characters.
pub const MAX_VOICE_ID_LEN: usize = 20;

pub const KNOWN_FIELDS: &str = "ABCDFGHIKLMmNOPQRrSsTUVWwXZ+";

/// Fields that may only appear in a tune or file header.
const HEADER_ONLY_FIELDS: &str = "XABCDFGHOSZ";

/// Fields that may be written inline as `[K:G]`.
const INLINE_FIELDS: &str = "IKLMmNPQRrUV";

pub fn is_known_field(id: char) -> bool {
    KNOWN_FIELDS.contains(id)
}

pub fn allowed_in_body(id: char) -> bool {
    !HEADER_ONLY_FIELDS.contains(id)
}

pub fn allowed_inline(id: char) -> bool {
    INLINE_FIELDS.contains(id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stem {
    Up,
    Down,
    Auto,
}

/// Declaration carried by a V: field.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct VoiceSpec {
    pub id: String,
    pub name: Option<TextString>,
    pub subname: Option<TextString>,
    pub clef: Option<Clef>,
    pub stem: Option<Stem>,
}

impl VoiceSpec {
    pub fn new(id: &str) -> Self {
        Self {
            id: truncate_voice_id(id),
            ..Default::default()
        }
    }

    /// Lays the attributes given in `other` over this declaration.
    pub fn merge(&mut self, other: &VoiceSpec) {
        if other.name.is_some() {
            self.name = other.name.clone();
        }
        if other.subname.is_some() {
            self.subname = other.subname.clone();
        }
        if other.clef.is_some() {
            self.clef = other.clef.clone();
        }
        if other.stem.is_some() {
            self.stem = other.stem;
        }
    }
}

pub fn truncate_voice_id(id: &str) -> String {
    id.chars().take(MAX_VOICE_ID_LEN).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldValue {
    Text(TextString),
    RefNumber(u32),
    Key(Key),
    Meter(Meter),
    UnitNoteLength(Duration),
    Tempo(Tempo),
    Voice(VoiceSpec),
    /// Header P: field: the order parts are played in, expanded.
    PlayOrder(Vec<String>),
    /// Body P: field: start of the named part.
    Part(String),
    Instruction(Instruction),
    /// U: field. `None` removes the symbol's decoration.
    UserSymbol {
        symbol: char,
        decoration: Option<String>,
    },
    Macro {
        target: String,
        replacement: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub id: char,
    pub value: FieldValue,
    /// Field text after the colon, as written.
    pub raw: String,
    /// Written inside `[...]` in a music line.
    pub inline: bool,
}

impl Field {
    pub fn text(&self) -> Option<&TextString> {
        match &self.value {
            FieldValue::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&Key> {
        match &self.value {
            FieldValue::Key(k) => Some(k),
            _ => None,
        }
    }

    pub fn meter(&self) -> Option<&Meter> {
        match &self.value {
            FieldValue::Meter(m) => Some(m),
            _ => None,
        }
    }

    pub fn unit_note_length(&self) -> Option<Duration> {
        match &self.value {
            FieldValue::UnitNoteLength(l) => Some(*l),
            _ => None,
        }
    }

    pub fn instruction(&self) -> Option<&Instruction> {
        match &self.value {
            FieldValue::Instruction(i) => Some(i),
            _ => None,
        }
    }

    pub fn voice(&self) -> Option<&VoiceSpec> {
        match &self.value {
            FieldValue::Voice(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_locations() {
        assert!(allowed_in_body('K'));
        assert!(allowed_in_body('T'));
        assert!(!allowed_in_body('X'));
        assert!(!allowed_in_body('C'));
        assert!(allowed_inline('V'));
        assert!(!allowed_inline('T'));
        assert!(is_known_field('w'));
        assert!(!is_known_field('J'));
    }

    #[test]
    fn test_voice_id_truncation() {
        let spec = VoiceSpec::new("abcdefghijklmnopqrstuvwxy");
        assert_eq!(spec.id, "abcdefghijklmnopqrst");
        assert_eq!(VoiceSpec::new("T1").id, "T1");
    }
}
