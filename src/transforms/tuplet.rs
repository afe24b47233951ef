use super::{sync_chord, voice_element_ids};
use crate::tune::Tune;
use crate::types::duration::{Duration, one};
use crate::types::element::Element;
use crate::types::field::FieldValue;

/// Scales the units covered by each `(p:q:r` marker by q/p. The marker is
/// stored on the first unit it covers; rests count towards `r`.
pub fn transform(tune: &mut Tune) {
    let header_compound = tune.meter().is_compound();

    for ids in voice_element_ids(tune) {
        let mut compound = header_compound;
        let mut remaining = 0;
        let mut ratio: Duration = one();
        let mut marker = None;

        for id in ids {
            let element = &mut tune.items[id].element;
            match element {
                Element::Field(field) => {
                    if let FieldValue::Meter(meter) = &field.value {
                        compound = meter.is_compound();
                    }
                }
                Element::Tuplet(tuplet) => {
                    remaining = tuplet.note_count();
                    ratio = tuplet.ratio(compound);
                    marker = Some(tuplet.clone());
                }
                _ => {
                    if remaining == 0 {
                        continue;
                    }
                    let Some(unit) = element.as_unit_mut() else {
                        continue;
                    };
                    let state = unit.unit_mut();
                    state.tuplet_ratio *= ratio;
                    if let Some(marker) = marker.take() {
                        state.tuplet = Some(marker);
                    }
                    remaining -= 1;
                    sync_chord(element);
                }
            }
        }
        if remaining > 0 {
            log::debug!("Tuplet short by {} notes at end of voice", remaining);
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
    fn test_triplet() {
        let tune = parse_tune("X:1\nL:1/8\nK:C\n(3abc d\n");
        assert_eq!(
            unit_durations(&tune),
            vec![duration(1, 12), duration(1, 12), duration(1, 12), duration(1, 8)]
        );
        let Element::Note(first) = &tune.items[1].element else {
            panic!("expected note after tuplet marker");
        };
        assert_eq!(first.unit.tuplet.as_ref().map(|t| t.p), Some(3));
    }

    #[test]
    fn test_explicit_ratio_and_count() {
        let tune = parse_tune("X:1\nL:1/8\nK:C\n(3:2:2a2b c\n");
        assert_eq!(
            unit_durations(&tune),
            vec![duration(1, 6), duration(1, 12), duration(1, 8)]
        );
    }

    #[test]
    fn test_compound_meter_default() {
        let simple = parse_tune("X:1\nM:4/4\nL:1/8\nK:C\n(5abcde\n");
        assert_eq!(unit_durations(&simple)[0], duration(1, 20));
        let compound = parse_tune("X:1\nM:6/8\nL:1/8\nK:C\n(5abcde\n");
        assert_eq!(unit_durations(&compound)[0], duration(3, 40));
    }

    #[test]
    fn test_rests_count_and_short_tuplets() {
        let tune = parse_tune("X:1\nL:1/8\nK:C\n(3azb\n");
        assert_eq!(unit_durations(&tune), vec![duration(1, 12); 3]);
        let tune = parse_tune("X:1\nL:1/8\nK:C\n(3ab\n");
        assert_eq!(unit_durations(&tune), vec![duration(1, 12); 2]);
    }
}
