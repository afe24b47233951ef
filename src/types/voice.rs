use crate::types::clef::Clef;
use crate::types::element::ElementId;
use crate::types::field::{Stem, VoiceSpec};
use crate::types::instruction::MidiVoice;
use crate::types::text::TextString;
use serde::Serialize;

/// Parallel content introduced by `&` inside a measure.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Overlay {
    pub elements: Vec<ElementId>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Measure {
    /// 1-based.
    pub number: usize,
    pub left_bar: Option<ElementId>,
    pub right_bar: Option<ElementId>,
    /// Everything between the bars, bar lines excluded.
    pub elements: Vec<ElementId>,
    pub overlays: Vec<Overlay>,
}

impl Measure {
    pub fn new(number: usize, left_bar: Option<ElementId>) -> Self {
        Self {
            number,
            left_bar,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Voice {
    pub id: String,
    pub name: Option<TextString>,
    pub subname: Option<TextString>,
    pub clef: Option<Clef>,
    pub stem: Option<Stem>,
    pub midi: Option<MidiVoice>,
    pub elements: Vec<ElementId>,
    pub measures: Vec<Measure>,
}

impl Voice {
    pub fn new(id: &str) -> Self {
        Self::from_spec(&VoiceSpec::new(id))
    }

    pub fn from_spec(spec: &VoiceSpec) -> Self {
        Self {
            id: spec.id.clone(),
            name: spec.name.clone(),
            subname: spec.subname.clone(),
            clef: spec.clef.clone(),
            stem: spec.stem,
            midi: None,
            elements: Vec::new(),
            measures: Vec::new(),
        }
    }

    /// Applies attributes from a later V: field for this voice. A clef only
    /// becomes the voice's starting clef while the voice has no content;
    /// after that it is a clef change in the element stream.
    pub fn update(&mut self, spec: &VoiceSpec) {
        if spec.name.is_some() {
            self.name = spec.name.clone();
        }
        if spec.subname.is_some() {
            self.subname = spec.subname.clone();
        }
        if spec.clef.is_some() && self.elements.is_empty() {
            self.clef = spec.clef.clone();
        }
        if spec.stem.is_some() {
            self.stem = spec.stem;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    pub id: String,
    pub elements: Vec<ElementId>,
    pub measures: Vec<Measure>,
}

impl Part {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            elements: Vec::new(),
            measures: Vec::new(),
        }
    }
}
