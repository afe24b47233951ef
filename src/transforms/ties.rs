use super::voice_element_ids;
use crate::tune::Tune;
use crate::types::element::{Element, ElementId, Note, SlurKind};

/// (letter, octave) of the chord members written with a tie, as in `[C-E]`.
fn tied_members(element: &Element) -> Vec<(char, i32)> {
    match element {
        Element::Chord(chord) => chord
            .notes
            .iter()
            .filter(|n| n.unit.tied_right)
            .map(|n| (n.pitch.note, n.pitch.octave))
            .collect(),
        _ => Vec::new(),
    }
}

fn link_members(element: &mut Element, tied: &[(char, i32)]) {
    let notes: Vec<&mut Note> = match element {
        Element::Chord(chord) => chord.notes.iter_mut().collect(),
        Element::Note(note) => vec![note],
        _ => Vec::new(),
    };
    for note in notes {
        if tied.contains(&(note.pitch.note, note.pitch.octave)) {
            note.unit.tied_left = true;
        }
    }
}

/// Links ties and slurs in one forward scan per voice. Both may cross bar
/// lines and fields. Markers that have nothing to attach to are dropped.
pub fn transform(tune: &mut Tune) {
    for ids in voice_element_ids(tune) {
        let mut previous: Option<ElementId> = None;
        // the element before the current one was a unit
        let mut after_unit = false;
        let mut tie_pending = false;
        let mut member_ties: Vec<(char, i32)> = Vec::new();
        let mut slurs = 0;
        let mut dotted_slurs = 0;

        for id in ids {
            let element = &mut tune.items[id].element;
            match element {
                Element::Tie(marker) => {
                    let dotted = marker.dotted;
                    match previous {
                        Some(prev) if after_unit => {
                            if let Some(unit) = tune.items[prev].element.as_unit_mut() {
                                let state = unit.unit_mut();
                                state.tied_right = true;
                                state.tied_right_dotted = dotted;
                            }
                            tie_pending = true;
                        }
                        _ => log::debug!("Ignoring tie that does not follow a note"),
                    }
                    after_unit = false;
                }
                Element::Slur(marker) => {
                    let (kind, dotted) = (marker.kind, marker.dotted);
                    match kind {
                        SlurKind::Start if dotted => dotted_slurs += 1,
                        SlurKind::Start => slurs += 1,
                        SlurKind::End => {
                            if let Some(unit) =
                                previous.and_then(|p| tune.items[p].element.as_unit_mut())
                            {
                                unit.unit_mut().end_slur += 1;
                            }
                        }
                    }
                    after_unit = false;
                }
                _ => {
                    if !element.is_unit() {
                        after_unit = false;
                        continue;
                    }
                    link_members(element, &member_ties);
                    member_ties = tied_members(element);
                    let Some(unit) = element.as_unit_mut() else {
                        continue;
                    };
                    let state = unit.unit_mut();
                    if tie_pending {
                        state.tied_left = true;
                        tie_pending = false;
                    }
                    state.start_slur += slurs;
                    state.start_dotted_slur += dotted_slurs;
                    slurs = 0;
                    dotted_slurs = 0;
                    previous = Some(id);
                    after_unit = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tune::Tune;
    use crate::types::element::{Chord, Element};
    use crate::types::unit::UnitState;
    use crate::util::parse_tune;
    use pretty_assertions::assert_eq;

    fn units(tune: &Tune) -> Vec<&UnitState> {
        tune.items
            .iter()
            .filter_map(|i| i.element.as_unit())
            .map(|u| u.unit())
            .collect()
    }

    #[test]
    fn test_tie_scan() {
        let tune = parse_tune("X:1\nK:C\nA-A\n");
        let u = units(&tune);
        assert!(u[0].tied_right && !u[0].tied_left);
        assert!(u[1].tied_left && !u[1].tied_right);

        let tune = parse_tune("X:1\nK:C\nAA\n");
        let u = units(&tune);
        assert!(!u[0].tied_right && !u[1].tied_left);
    }

    #[test]
    fn test_tie_across_bar_and_field() {
        let tune = parse_tune("X:1\nK:C\nc2.-|[L:1/4] c d\n");
        let u = units(&tune);
        assert!(u[0].tied_right && u[0].tied_right_dotted);
        assert!(u[1].tied_left);
        assert!(!u[2].tied_left);
    }

    #[test]
    fn test_chord_member_ties() {
        let tune = parse_tune("X:1\nK:C\n[C-E] | [CE] [C-G] C\n");
        let chords: Vec<&Chord> = tune
            .items
            .iter()
            .filter_map(|i| match &i.element {
                Element::Chord(c) => Some(c),
                _ => None,
            })
            .collect();
        let members: Vec<Vec<(bool, bool)>> = chords
            .iter()
            .map(|c| {
                c.notes
                    .iter()
                    .map(|n| (n.unit.tied_left, n.unit.tied_right))
                    .collect()
            })
            .collect();
        assert_eq!(
            members,
            vec![
                vec![(false, true), (false, false)],
                vec![(true, false), (false, false)],
                vec![(false, true), (false, false)],
            ]
        );
        assert!(tune.notes().last().is_some_and(|n| n.unit.tied_left));
        assert!(!chords[1].unit.tied_left);
    }

    #[test]
    fn test_tie_without_note_is_ignored() {
        let tune = parse_tune("X:1\nK:C\n| -A B\n");
        let u = units(&tune);
        assert!(!u[0].tied_left);
    }

    #[test]
    fn test_nested_slurs() {
        let tune = parse_tune("X:1\nK:C\n((AB) .(c|d))\n");
        let u = units(&tune);
        let counts: Vec<(u32, u32, u32)> = u
            .iter()
            .map(|s| (s.start_slur, s.start_dotted_slur, s.end_slur))
            .collect();
        assert_eq!(counts, vec![(2, 0, 0), (0, 0, 1), (0, 1, 0), (0, 0, 2)]);
    }

    #[test]
    fn test_unmatched_end_slur() {
        let tune = parse_tune("X:1\nK:C\n) A)\n");
        assert_eq!(units(&tune)[0].end_slur, 1);
    }
}
