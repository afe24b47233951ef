use crate::config::ParserOptions;
use crate::error::{Diagnostic, DiagnosticKind};
use crate::types::clef::Clef;
use crate::types::duration::Duration;
use crate::types::element::{Element, ElementId, Note};
use crate::types::header::Header;
use crate::types::instruction::Staves;
use crate::types::key::Key;
use crate::types::meter::Meter;
use crate::types::tempo::Tempo;
use crate::types::voice::{Measure, Part, Voice};
use serde::Serialize;

/// A body element with the voice and part it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TuneItem {
    pub element: Element,
    pub voice_id: String,
    pub part_id: String,
    /// 1-based source line.
    pub line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tune {
    pub refnum: u32,
    pub header: Header,
    /// Every body element in source order. Voices, parts and measures
    /// refer into this list by index.
    pub items: Vec<TuneItem>,
    pub voices: Vec<Voice>,
    pub parts: Vec<Part>,
    pub staves: Option<Staves>,
    /// `%%MIDI chordprog` program for chord accompaniment.
    pub chord_program: Option<u8>,
    /// Parser settings in effect when the body started.
    pub options: ParserOptions,
    pub diagnostics: Vec<Diagnostic>,
}

impl Tune {
    pub fn new(header: Header, options: ParserOptions) -> Self {
        Self {
            refnum: header.refnum().unwrap_or(1),
            header,
            items: Vec::new(),
            voices: Vec::new(),
            parts: Vec::new(),
            staves: None,
            chord_program: None,
            options,
            diagnostics: Vec::new(),
        }
    }

    pub fn push(&mut self, element: Element, line: usize) -> ElementId {
        self.items.push(TuneItem {
            element,
            voice_id: String::new(),
            part_id: String::new(),
            line,
        });
        self.items.len() - 1
    }

    pub fn diagnose(&mut self, line: usize, kind: DiagnosticKind) {
        self.diagnostics.push(Diagnostic::new(line, kind));
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.items[id].element
    }

    pub fn key(&self) -> Key {
        self.header.key().cloned().unwrap_or_default()
    }

    pub fn meter(&self) -> Meter {
        self.header.meter().cloned().unwrap_or_default()
    }

    pub fn tempo(&self) -> Option<&Tempo> {
        self.header.tempo()
    }

    /// L: from the header, or the default for the header's meter.
    pub fn unit_note_length(&self) -> Duration {
        self.header
            .unit_note_length()
            .unwrap_or_else(|| self.meter().default_unit_note_length())
    }

    pub fn clef(&self) -> Clef {
        self.key().clef()
    }

    pub fn title(&self) -> Option<String> {
        self.header.text('T')
    }

    pub fn titles(&self) -> Vec<String> {
        self.header.texts('T')
    }

    pub fn composers(&self) -> Vec<String> {
        self.header.texts('C')
    }

    pub fn origin(&self) -> Option<String> {
        self.header.text('O')
    }

    pub fn rhythm(&self) -> Option<String> {
        self.header.text('R')
    }

    pub fn notes_field(&self) -> Vec<String> {
        self.header.texts('N')
    }

    pub fn voice(&self, id: &str) -> Option<&Voice> {
        self.voices.iter().find(|v| v.id == id)
    }

    pub fn part(&self, id: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.id == id)
    }

    /// Measures of the first voice.
    pub fn measures(&self) -> &[Measure] {
        self.voices.first().map_or(&[], |v| v.measures.as_slice())
    }

    pub fn voice_elements(&self, id: &str) -> Vec<&Element> {
        self.voice(id)
            .map(|v| v.elements.iter().map(|i| self.element(*i)).collect())
            .unwrap_or_default()
    }

    /// All notes in source order, chord members excluded.
    pub fn notes(&self) -> Vec<&Note> {
        self.items.iter().filter_map(|i| i.element.as_note()).collect()
    }

    /// Body elements split into score lines at line-break markers. The
    /// markers themselves are left out.
    pub fn lines(&self) -> Vec<Vec<ElementId>> {
        let mut lines = Vec::new();
        let mut current = Vec::new();
        for (id, item) in self.items.iter().enumerate() {
            match item.element {
                Element::LineBreak(_) => lines.push(std::mem::take(&mut current)),
                _ => current.push(id),
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }
}
