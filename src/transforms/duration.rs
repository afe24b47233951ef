use super::{grace_items_mut, sync_chord, voice_element_ids};
use crate::tune::Tune;
use crate::types::duration::{Duration, one};
use crate::types::element::Element;
use crate::types::field::FieldValue;
use crate::types::meter::Meter;

fn assign(element: &mut Element, length: Duration, meter: &Meter) {
    match element {
        Element::MeasureRest(rest) => {
            rest.unit.unit_note_length = meter.value().unwrap_or_else(one);
        }
        _ => {
            let Some(unit) = element.as_unit_mut() else {
                return;
            };
            unit.unit_mut().unit_note_length = length;
            if let Some(items) = grace_items_mut(element) {
                for item in items.iter_mut() {
                    if let Some(grace) = item.as_unit_mut() {
                        grace.unit_mut().unit_note_length = length;
                    }
                    sync_chord(item);
                }
            }
            sync_chord(element);
        }
    }
}

/// Gives every unit the unit note length in effect where it is written.
/// Body L: and M: fields apply to the rest of their voice.
pub fn transform(tune: &mut Tune) {
    let header_meter = tune.meter();
    let header_length = tune.unit_note_length();

    for ids in voice_element_ids(tune) {
        let mut length = header_length;
        let mut meter = header_meter.clone();
        for id in ids {
            let element = &mut tune.items[id].element;
            if let Element::Field(field) = element {
                match &field.value {
                    FieldValue::UnitNoteLength(l) => length = *l,
                    FieldValue::Meter(m) => meter = m.clone(),
                    _ => {}
                }
                continue;
            }
            assign(element, length, &meter);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::types::duration::duration;
    use crate::types::element::Element;
    use crate::util::{parse_tune, unit_durations};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_written_length_times_unit() {
        let tune = parse_tune("X:1\nL:1/8\nK:C\na3/2 a2 a/ a\n");
        assert_eq!(
            unit_durations(&tune),
            vec![duration(3, 16), duration(1, 4), duration(1, 16), duration(1, 8)]
        );
    }

    #[test]
    fn test_default_unit_from_meter() {
        let tune = parse_tune("X:1\nM:2/4\nK:C\na\n");
        assert_eq!(unit_durations(&tune), vec![duration(1, 16)]);
        let tune = parse_tune("X:1\nM:6/8\nK:C\na\n");
        assert_eq!(unit_durations(&tune), vec![duration(1, 8)]);
    }

    #[test]
    fn test_body_length_changes() {
        let tune = parse_tune("X:1\nL:1/8\nK:C\na [L:1/4] a\nL:1/16\na\n");
        assert_eq!(
            unit_durations(&tune),
            vec![duration(1, 8), duration(1, 4), duration(1, 16)]
        );
    }

    #[test]
    fn test_measure_rest() {
        let tune = parse_tune("X:1\nM:3/4\nK:C\nZ2 | [M:2/4] Z |\n");
        assert_eq!(unit_durations(&tune), vec![duration(3, 2), duration(1, 2)]);
    }

    #[test]
    fn test_chord_and_grace_lengths() {
        let tune = parse_tune("X:1\nL:1/4\nK:C\n{ga}[Ce]2\n");
        let chord = match &tune.items[0].element {
            Element::Chord(c) => c,
            other => panic!("expected chord, got {:?}", other),
        };
        assert_eq!(chord.unit.duration(), duration(1, 2));
        for note in &chord.notes {
            assert_eq!(note.unit.duration(), duration(1, 2));
        }
        let grace = chord.unit.grace_notes.as_ref().unwrap();
        for item in &grace.items {
            assert_eq!(item.as_unit().unwrap().duration(), duration(1, 4));
        }
    }
}
