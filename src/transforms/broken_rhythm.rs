use super::{grace_items_mut, sync_chord, voice_element_ids};
use crate::tune::Tune;
use crate::types::duration::Duration;
use crate::types::element::Element;

/// Elements that may sit between a broken-rhythm marker and its units.
fn is_transparent(element: &Element) -> bool {
    matches!(
        element,
        Element::Space
            | Element::Slur(_)
            | Element::Tie(_)
            | Element::Tuplet(_)
            | Element::Decoration(_)
            | Element::Annotation(_)
            | Element::ChordSymbol(_)
    )
}

/// Finds (before, after, factors) for every marker that sits between two
/// units. Positions index into `elements`.
fn pairs<'a>(
    elements: impl Iterator<Item = &'a Element>,
) -> Vec<(usize, usize, (Duration, Duration))> {
    let mut out = Vec::new();
    let mut last_unit: Option<usize> = None;
    let mut pending = None;

    for (pos, element) in elements.enumerate() {
        match element {
            e if e.is_unit() => {
                if let Some((before, marker)) = pending.take() {
                    out.push((before, pos, marker));
                }
                last_unit = Some(pos);
            }
            Element::BrokenRhythm(marker) => {
                pending = last_unit.take().map(|before| (before, marker.factors()));
            }
            e if is_transparent(e) => {}
            _ => {
                last_unit = None;
                pending = None;
            }
        }
    }
    out
}

fn scale(element: &mut Element, factor: Duration) {
    if let Some(unit) = element.as_unit_mut() {
        unit.unit_mut().broken_rhythm *= factor;
    }
    sync_chord(element);
}

/// Applies `>`/`<` markers: the unit before and the unit after are scaled
/// by complementary factors that keep their total length.
pub fn transform(tune: &mut Tune) {
    for ids in voice_element_ids(tune) {
        let found = pairs(ids.iter().map(|id| &tune.items[*id].element));
        for (before, after, (first, second)) in found {
            scale(&mut tune.items[ids[before]].element, first);
            scale(&mut tune.items[ids[after]].element, second);
        }

        for id in &ids {
            let Some(items) = grace_items_mut(&mut tune.items[*id].element) else {
                continue;
            };
            for (before, after, (first, second)) in pairs(items.iter()) {
                scale(&mut items[before], first);
                scale(&mut items[after], second);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::types::duration::duration;
    use crate::types::element::Element;
    use crate::types::unit::MusicUnit;
    use crate::util::{parse_tune, unit_durations};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dotted_and_snapped() {
        let tune = parse_tune("X:1\nL:1/8\nK:C\na>b c<d e>>f\n");
        assert_eq!(
            unit_durations(&tune),
            vec![
                duration(3, 16),
                duration(1, 16),
                duration(1, 16),
                duration(3, 16),
                duration(7, 32),
                duration(1, 32),
            ]
        );
    }

    #[test]
    fn test_pair_total_is_kept() {
        for marker in [">", "<", ">>", "<<<"] {
            let tune = parse_tune(&format!("X:1\nL:1/8\nK:C\nA2{}B2\n", marker));
            let total: num_rational::Ratio<i64> = unit_durations(&tune).into_iter().sum();
            assert_eq!(total, duration(1, 2), "marker {}", marker);
        }
    }

    #[test]
    fn test_chains_and_chords() {
        let tune = parse_tune("X:1\nL:1/8\nK:C\na>b>c [ce]>d\n");
        assert_eq!(
            unit_durations(&tune),
            vec![
                duration(3, 16),
                duration(3, 32),
                duration(1, 16),
                duration(3, 16),
                duration(1, 16),
            ]
        );
        let chord = tune
            .items
            .iter()
            .find_map(|i| match &i.element {
                Element::Chord(c) => Some(c),
                _ => None,
            })
            .unwrap();
        assert_eq!(chord.notes[1].duration(), duration(3, 16));
    }

    #[test]
    fn test_grace_notes() {
        let tune = parse_tune("X:1\nL:1/8\nK:C\n{a>b}c\n");
        let Element::Note(note) = &tune.items[0].element else {
            panic!("expected note");
        };
        let grace = note.unit.grace_notes.as_ref().unwrap();
        let lengths: Vec<_> = grace
            .items
            .iter()
            .filter_map(|i| i.as_unit())
            .map(|u| u.duration())
            .collect();
        assert_eq!(lengths, vec![duration(3, 16), duration(1, 16)]);
    }

    #[test]
    fn test_marker_across_bar_is_ignored() {
        let tune = parse_tune("X:1\nL:1/8\nK:C\na>|b\n");
        assert_eq!(unit_durations(&tune), vec![duration(1, 8), duration(1, 8)]);
    }
}
