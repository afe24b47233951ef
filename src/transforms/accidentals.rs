use super::{grace_items_mut, voice_element_ids};
use crate::config::AccidentalPropagation;
use crate::tune::Tune;
use crate::types::element::Element;
use crate::types::field::FieldValue;
use crate::types::instruction::Instruction;
use crate::types::key::Signature;
use crate::types::pitch::Pitch;
use std::collections::HashMap;

/// Letter, plus the octave when accidentals only carry within it.
type LocalKey = (char, Option<i32>);

struct MeasureAccidentals {
    base: Signature,
    locals: HashMap<LocalKey, i8>,
    policy: AccidentalPropagation,
}

impl MeasureAccidentals {
    fn local_key(&self, pitch: &Pitch) -> Option<LocalKey> {
        match self.policy {
            AccidentalPropagation::Not => None,
            AccidentalPropagation::Octave => Some((pitch.note, Some(pitch.octave))),
            AccidentalPropagation::Pitch => Some((pitch.note, None)),
        }
    }

    fn resolve(&self, pitch: &mut Pitch) {
        let local = self
            .local_key(pitch)
            .and_then(|key| self.locals.get(&key).copied());
        let value = pitch
            .accidental
            .or(local)
            .or_else(|| self.base.get(&pitch.note).copied())
            .unwrap_or(0);
        pitch.resolved_accidental = Some(value);
    }

    fn record(&mut self, pitch: &Pitch) {
        if let (Some(accidental), Some(key)) = (pitch.accidental, self.local_key(pitch)) {
            self.locals.insert(key, accidental);
        }
    }

    fn apply(&mut self, element: &mut Element) {
        // grace notes see the accidentals in effect before their main note
        if let Some(items) = grace_items_mut(element) {
            for item in items.iter_mut() {
                if let Some(unit) = item.as_unit_mut() {
                    for pitch in unit.pitches_mut() {
                        self.resolve(pitch);
                    }
                }
            }
        }
        if let Some(unit) = element.as_unit_mut() {
            for pitch in unit.pitches_mut() {
                self.resolve(pitch);
                self.record(pitch);
            }
        }
    }
}

/// Resolves the accidental every pitch sounds with, from its own
/// accidental, earlier accidentals in the measure, and the key signature.
pub fn transform(tune: &mut Tune) {
    let signature = tune.key().signature();
    let policy = tune.options.propagate_accidentals;

    for ids in voice_element_ids(tune) {
        let mut state = MeasureAccidentals {
            base: signature.clone(),
            locals: HashMap::new(),
            policy,
        };
        for id in ids {
            let element = &mut tune.items[id].element;
            match element {
                Element::BarLine(bar) if !bar.dotted => state.locals.clear(),
                Element::Field(field) => match &field.value {
                    FieldValue::Key(key) => {
                        state.base = key.signature();
                        state.locals.clear();
                    }
                    FieldValue::Instruction(Instruction::PropagateAccidentals(p)) => {
                        state.policy = *p;
                    }
                    _ => {}
                },
                _ => state.apply(element),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::types::element::Element;
    use crate::util::{note_heights, parse_tune};
    use pretty_assertions::assert_eq;

    fn heights(header: &str, body: &str) -> Vec<i32> {
        note_heights(&parse_tune(&format!("X:1\n{}K:C\n{}\n", header, body)))
    }

    #[test]
    fn test_propagation_policies() {
        let body = "_C C c | C c";
        assert_eq!(
            heights("I:propagate-accidentals not\n", body),
            vec![-1, 0, 12, 0, 12]
        );
        assert_eq!(
            heights("I:propagate-accidentals octave\n", body),
            vec![-1, -1, 12, 0, 12]
        );
        assert_eq!(
            heights("I:propagate-accidentals pitch\n", body),
            vec![-1, -1, 11, 0, 12]
        );
        assert_eq!(heights("", body), vec![-1, -1, 11, 0, 12]);
    }

    #[test]
    fn test_key_signature_and_natural() {
        let tune = parse_tune("X:1\nT:T\nK:F\nB=BB");
        assert_eq!(note_heights(&tune), vec![10, 11, 11]);
    }

    #[test]
    fn test_dotted_bar_keeps_accidentals() {
        assert_eq!(heights("", "^F F .| F | F"), vec![6, 6, 6, 5]);
    }

    #[test]
    fn test_key_change_resets() {
        assert_eq!(heights("", "^c c [K:Bb] c B e"), vec![13, 13, 12, 10, 15]);
    }

    #[test]
    fn test_body_policy_change() {
        assert_eq!(
            heights("", "^C c |\nI:propagate-accidentals not\n^C C"),
            vec![1, 13, 1, 0]
        );
    }

    #[test]
    fn test_grace_notes_see_earlier_accidentals() {
        let tune = parse_tune("X:1\nK:C\n{c}^c {c}c\n");
        let graces: Vec<i32> = tune
            .items
            .iter()
            .filter_map(|i| i.element.as_note())
            .map(|n| {
                let grace = n.unit.grace_notes.as_ref().unwrap();
                grace.items[0].as_note().unwrap().height()
            })
            .collect();
        assert_eq!(graces, vec![12, 13]);
        assert_eq!(note_heights(&tune), vec![13, 13]);
    }

    #[test]
    fn test_chord_members() {
        assert_eq!(heights("", "[^CE] C"), vec![1]);
        let tune = parse_tune("X:1\nK:D\n[DFA]\n");
        let chord = tune
            .items
            .iter()
            .find_map(|i| match &i.element {
                Element::Chord(c) => Some(c),
                _ => None,
            })
            .unwrap();
        let heights: Vec<i32> = chord.notes.iter().map(|n| n.height()).collect();
        assert_eq!(heights, vec![2, 6, 9]);
    }
}
