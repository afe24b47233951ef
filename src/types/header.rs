use crate::types::duration::Duration;
use crate::types::field::{Field, FieldValue, VoiceSpec};
use crate::types::instruction::Instruction;
use crate::types::key::Key;
use crate::types::meter::Meter;
use crate::types::tempo::Tempo;
use serde::Serialize;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Ordered header fields. A tune header falls back to its file header
/// (the master) for fields it does not set itself.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Header {
    pub fields: Vec<Field>,
    #[serde(skip)]
    pub master: Option<Rc<Header>>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_master(master: Rc<Header>) -> Self {
        Self {
            fields: Vec::new(),
            master: Some(master),
        }
    }

    pub fn push(&mut self, field: Field) {
        self.fields.push(field);
    }

    fn local(&self, id: char) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(move |f| f.id == id)
    }

    /// First field with this id, looking in the master when absent here.
    pub fn first(&self, id: char) -> Option<&Field> {
        self.local(id)
            .next()
            .or_else(|| self.master.as_deref().and_then(|m| m.first(id)))
    }

    /// All fields with this id. Repeated fields accumulate; the master's
    /// are used only when this header has none.
    pub fn all(&self, id: char) -> Vec<&Field> {
        let local: Vec<&Field> = self.local(id).collect();
        if local.is_empty() {
            if let Some(master) = self.master.as_deref() {
                return master.all(id);
            }
        }
        local
    }

    pub fn text(&self, id: char) -> Option<String> {
        self.first(id)
            .and_then(|f| f.text())
            .map(|t| t.as_str().to_string())
    }

    pub fn texts(&self, id: char) -> Vec<String> {
        self.all(id)
            .into_iter()
            .filter_map(|f| f.text())
            .map(|t| t.as_str().to_string())
            .collect()
    }

    pub fn refnum(&self) -> Option<u32> {
        match self.local('X').next().map(|f| &f.value) {
            Some(FieldValue::RefNumber(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&Key> {
        self.first('K').and_then(|f| f.key())
    }

    pub fn meter(&self) -> Option<&Meter> {
        self.first('M').and_then(|f| f.meter())
    }

    pub fn unit_note_length(&self) -> Option<Duration> {
        self.first('L').and_then(|f| f.unit_note_length())
    }

    pub fn tempo(&self) -> Option<&Tempo> {
        match self.first('Q').map(|f| &f.value) {
            Some(FieldValue::Tempo(t)) => Some(t),
            _ => None,
        }
    }

    pub fn play_order(&self) -> Option<&[String]> {
        match self.first('P').map(|f| &f.value) {
            Some(FieldValue::PlayOrder(order)) => Some(order),
            _ => None,
        }
    }

    /// Instructions from the master then this header. A later instruction
    /// with the same key replaces the earlier one in place.
    pub fn instructions(&self) -> Vec<Instruction> {
        let mut merged: Vec<Instruction> = match self.master.as_deref() {
            Some(master) => master.instructions(),
            None => Vec::new(),
        };
        for instruction in self.local('I').filter_map(|f| f.instruction()) {
            let key = instruction.key();
            match merged.iter_mut().find(|i| i.key() == key) {
                Some(existing) => *existing = instruction.clone(),
                None => merged.push(instruction.clone()),
            }
        }
        merged
    }

    pub fn instruction(&self, key: &str) -> Option<Instruction> {
        self.instructions().into_iter().find(|i| i.key() == key)
    }

    /// U: symbol table, master entries overridden by local ones.
    pub fn user_symbols(&self) -> BTreeMap<char, Option<String>> {
        let mut symbols = match self.master.as_deref() {
            Some(master) => master.user_symbols(),
            None => BTreeMap::new(),
        };
        for field in self.local('U') {
            if let FieldValue::UserSymbol { symbol, decoration } = &field.value {
                symbols.insert(*symbol, decoration.clone());
            }
        }
        symbols
    }

    /// m: macros as (target, replacement), master first, a local macro
    /// replacing a master one with the same target.
    pub fn macros(&self) -> Vec<(String, String)> {
        let mut macros = match self.master.as_deref() {
            Some(master) => master.macros(),
            None => Vec::new(),
        };
        for field in self.local('m') {
            if let FieldValue::Macro {
                target,
                replacement,
            } = &field.value
            {
                match macros.iter_mut().find(|(t, _)| t == target) {
                    Some(existing) => existing.1 = replacement.clone(),
                    None => macros.push((target.clone(), replacement.clone())),
                }
            }
        }
        macros
    }

    /// V: declarations in order of first appearance, later declarations of
    /// the same id merged over earlier ones.
    pub fn voices(&self) -> Vec<VoiceSpec> {
        let mut voices: Vec<VoiceSpec> = Vec::new();
        for spec in self.local('V').filter_map(|f| f.voice()) {
            match voices.iter_mut().find(|v| v.id == spec.id) {
                Some(existing) => existing.merge(spec),
                None => voices.push(spec.clone()),
            }
        }
        voices
    }
}
