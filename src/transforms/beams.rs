use super::voice_element_ids;
use crate::tune::Tune;
use crate::types::duration::Duration;
use crate::types::element::{Element, ElementId};
use crate::types::unit::Beam;

fn close_group(tune: &mut Tune, group: &mut Vec<ElementId>) {
    let last = group.len().saturating_sub(1);
    if group.len() > 1 {
        for (pos, id) in group.iter().enumerate() {
            let beam = match pos {
                0 => Beam::Start,
                p if p == last => Beam::End,
                _ => Beam::Middle,
            };
            if let Some(unit) = tune.items[*id].element.as_unit_mut() {
                unit.unit_mut().beam = Some(beam);
            }
        }
    }
    group.clear();
}

/// Groups consecutive notes and chords of an eighth or shorter. Whitespace,
/// bar lines, fields, line breaks, rests and longer units end a group; a
/// group of one note gets no beam.
pub fn transform(tune: &mut Tune) {
    let eighth = Duration::new(1, 8);

    for ids in voice_element_ids(tune) {
        let mut group: Vec<ElementId> = Vec::new();
        for id in ids {
            let element = &tune.items[id].element;
            let beamable = match element {
                Element::Note(_) | Element::Chord(_) => {
                    element.as_unit().is_some_and(|u| u.duration() <= eighth)
                }
                Element::Tie(_)
                | Element::Slur(_)
                | Element::Tuplet(_)
                | Element::BrokenRhythm(_)
                | Element::Decoration(_)
                | Element::Annotation(_)
                | Element::ChordSymbol(_) => continue,
                _ => false,
            };
            if beamable {
                group.push(id);
            } else {
                close_group(tune, &mut group);
            }
        }
        close_group(tune, &mut group);
    }
}

#[cfg(test)]
mod tests {
    use crate::types::unit::Beam;
    use crate::util::parse_tune;
    use pretty_assertions::assert_eq;

    fn beams(text: &str) -> Vec<Option<Beam>> {
        let tune = parse_tune(text);
        tune.items
            .iter()
            .filter_map(|i| i.element.as_unit())
            .map(|u| u.unit().beam)
            .collect()
    }

    #[test]
    fn test_groups() {
        use Beam::*;
        assert_eq!(
            beams("X:1\nL:1/8\nK:C\nabc d2 e|f\n"),
            vec![Some(Start), Some(Middle), Some(End), None, None, None]
        );
        assert_eq!(
            beams("X:1\nL:1/16\nK:C\nabcd efg\n"),
            vec![
                Some(Start),
                Some(Middle),
                Some(Middle),
                Some(End),
                Some(Start),
                Some(Middle),
                Some(End),
            ]
        );
    }

    #[test]
    fn test_rests_break_groups() {
        use Beam::*;
        assert_eq!(
            beams("X:1\nL:1/8\nK:C\nabzcd\n"),
            vec![Some(Start), Some(End), None, Some(Start), Some(End)]
        );
    }

    #[test]
    fn test_line_continuation() {
        use Beam::*;
        assert_eq!(
            beams("X:1\nL:1/8\nK:C\nab\\\ncd\n"),
            vec![Some(Start), Some(Middle), Some(Middle), Some(End)]
        );
        // the space before the backslash ends the group
        assert_eq!(
            beams("X:1\nL:1/8\nK:C\nab \\\ncd\n"),
            vec![Some(Start), Some(End), Some(Start), Some(End)]
        );
    }

    #[test]
    fn test_ties_and_triplets_keep_group() {
        use Beam::*;
        assert_eq!(
            beams("X:1\nL:1/8\nK:C\n(3a-ab c\n"),
            vec![Some(Start), Some(Middle), Some(End), None]
        );
    }
}
