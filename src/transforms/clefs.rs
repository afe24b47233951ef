use super::grace_items_mut;
use crate::tune::Tune;
use crate::types::clef::Clef;
use crate::types::element::Element;
use crate::types::field::FieldValue;

fn assign(element: &mut Element, clef: &Clef) {
    if let Some(items) = grace_items_mut(element) {
        for item in items.iter_mut() {
            if let Some(unit) = item.as_unit_mut() {
                for pitch in unit.pitches_mut() {
                    pitch.clef = Some(clef.clone());
                }
            }
        }
    }
    if let Some(unit) = element.as_unit_mut() {
        for pitch in unit.pitches_mut() {
            pitch.clef = Some(clef.clone());
        }
    }
}

/// Gives every pitch the clef it is read in: the voice's clef, or the
/// key's, until a K: or V: field in the voice names another.
pub fn transform(tune: &mut Tune) {
    let default_clef = tune.clef();
    let voices: Vec<(String, Option<Clef>, Vec<usize>)> = tune
        .voices
        .iter()
        .map(|v| (v.id.clone(), v.clef.clone(), v.elements.clone()))
        .collect();

    for (voice_id, voice_clef, ids) in voices {
        let mut current = voice_clef.unwrap_or_else(|| default_clef.clone());
        for id in ids {
            let element = &mut tune.items[id].element;
            if let Element::Field(field) = element {
                match &field.value {
                    FieldValue::Key(key) => {
                        if let Some(clef) = &key.clef {
                            current = clef.clone();
                        }
                    }
                    FieldValue::Voice(spec) if spec.id == voice_id => {
                        if let Some(clef) = &spec.clef {
                            current = clef.clone();
                        }
                    }
                    _ => {}
                }
                continue;
            }
            assign(element, &current);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::types::clef::ClefKind;
    use crate::util::{note_heights, parse_tune};
    use pretty_assertions::assert_eq;

    fn clefs(text: &str) -> Vec<ClefKind> {
        parse_tune(text)
            .notes()
            .iter()
            .map(|n| n.pitch.clef.as_ref().unwrap().kind)
            .collect()
    }

    #[test]
    fn test_key_clef() {
        assert_eq!(
            clefs("X:1\nK:C clef=bass\nC [K:G] D [K:D clef=alto] E\n"),
            vec![ClefKind::Bass, ClefKind::Bass, ClefKind::Alto]
        );
    }

    #[test]
    fn test_voice_clef() {
        let tune = parse_tune("X:1\nV:1 clef=bass\nV:2\nK:C\nV:1\nC\nV:2\nC\nV:1 clef=alto\nD\n");
        let kinds: Vec<(String, ClefKind)> = tune
            .items
            .iter()
            .filter_map(|i| {
                i.element
                    .as_note()
                    .map(|n| (i.voice_id.clone(), n.pitch.clef.as_ref().unwrap().kind))
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("1".to_string(), ClefKind::Bass),
                ("2".to_string(), ClefKind::Treble),
                ("1".to_string(), ClefKind::Alto),
            ]
        );
    }

    #[test]
    fn test_octave_clef_shifts_height() {
        let tune = parse_tune("X:1\nK:C clef=treble-8\nc\n");
        assert_eq!(note_heights(&tune), vec![0]);
    }
}
