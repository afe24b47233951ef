use crate::tune::Tune;
use crate::types::element::{Element, ElementId};
use crate::types::voice::{Measure, Overlay};
use std::collections::VecDeque;

/// Splits a voice's or part's elements into measures.
///
/// A bar line before any music is the first measure's left bar. `&` adds
/// an overlay to the current measure; `&&` and longer runs reach back over
/// that many measures, the following bars moving the overlay on to the
/// next of them.
pub fn collect(tune: &Tune, ids: &[ElementId]) -> Vec<Measure> {
    let mut measures: Vec<Measure> = Vec::new();
    let mut current = Measure::new(1, None);
    let mut has_music = false;
    // set while elements go into an overlay: the measure receiving them
    let mut overlay: Option<usize> = None;
    let mut queue: VecDeque<usize> = VecDeque::new();

    for &id in ids {
        match &tune.items[id].element {
            Element::Overlay(marker) => {
                if overlay.is_none() {
                    measures.push(std::mem::take(&mut current));
                    has_music = false;
                }
                let first = measures.len().saturating_sub(marker.count.max(1));
                queue = (first..measures.len()).collect();
                overlay = queue.pop_front();
                if let Some(m) = overlay {
                    measures[m].overlays.push(Overlay::default());
                }
            }
            Element::BarLine(_) if overlay.is_some() => match queue.pop_front() {
                Some(next) => {
                    measures[next].overlays.push(Overlay::default());
                    overlay = Some(next);
                }
                None => {
                    if let Some(last) = measures.last_mut() {
                        last.right_bar = Some(id);
                    }
                    overlay = None;
                    current = Measure::new(measures.len() + 1, Some(id));
                    has_music = false;
                }
            },
            Element::BarLine(_) => {
                if measures.is_empty() && !has_music && current.left_bar.is_none() {
                    current.left_bar = Some(id);
                    continue;
                }
                current.right_bar = Some(id);
                measures.push(std::mem::take(&mut current));
                current = Measure::new(measures.len() + 1, Some(id));
                has_music = false;
            }
            element => match overlay {
                Some(m) => {
                    if let Some(target) = measures[m].overlays.last_mut() {
                        target.elements.push(id);
                    }
                }
                None => {
                    has_music |= element.is_unit();
                    current.elements.push(id);
                }
            },
        }
    }

    if has_music {
        measures.push(current);
    }
    measures
}

pub fn transform(tune: &mut Tune) {
    let voice_measures: Vec<Vec<Measure>> = tune
        .voices
        .iter()
        .map(|v| collect(tune, &v.elements))
        .collect();
    for (voice, measures) in tune.voices.iter_mut().zip(voice_measures) {
        voice.measures = measures;
    }

    let part_measures: Vec<Vec<Measure>> = tune
        .parts
        .iter()
        .map(|p| collect(tune, &p.elements))
        .collect();
    for (part, measures) in tune.parts.iter_mut().zip(part_measures) {
        part.measures = measures;
    }
}

#[cfg(test)]
mod tests {
    use crate::tune::Tune;
    use crate::types::voice::Measure;
    use crate::util::parse_tune;
    use pretty_assertions::assert_eq;

    fn letters(tune: &Tune, ids: &[usize]) -> String {
        ids.iter()
            .filter_map(|i| tune.element(*i).as_note())
            .map(|n| n.pitch.note)
            .collect()
    }

    fn summary(tune: &Tune, measures: &[Measure]) -> Vec<(String, Vec<String>)> {
        measures
            .iter()
            .map(|m| {
                (
                    letters(tune, &m.elements),
                    m.overlays.iter().map(|o| letters(tune, &o.elements)).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_bars_split_measures() {
        let tune = parse_tune("X:1\nK:C\n|:AB|CD:|\nEF|]\n");
        let measures = tune.measures();
        assert_eq!(measures.len(), 3);
        assert_eq!(
            summary(&tune, measures),
            vec![
                ("AB".to_string(), vec![]),
                ("CD".to_string(), vec![]),
                ("EF".to_string(), vec![]),
            ]
        );
        let first = &measures[0];
        assert_eq!(first.number, 1);
        let left = tune.element(first.left_bar.unwrap()).as_bar_line().unwrap();
        assert_eq!(left.repeat_start, 1);
        assert_eq!(measures[1].left_bar, first.right_bar);
        assert_eq!(measures[2].number, 3);
    }

    #[test]
    fn test_trailing_music_without_bar() {
        let tune = parse_tune("X:1\nK:C\nAB|CD\n");
        assert_eq!(
            summary(&tune, tune.measures()),
            vec![("AB".to_string(), vec![]), ("CD".to_string(), vec![])]
        );
        assert_eq!(tune.measures()[1].right_bar, None);
    }

    #[test]
    fn test_overlay() {
        let tune = parse_tune("X:1\nK:C\nAB&CD|EF|\n");
        assert_eq!(
            summary(&tune, tune.measures()),
            vec![
                ("AB".to_string(), vec!["CD".to_string()]),
                ("EF".to_string(), vec![]),
            ]
        );
        assert!(tune.measures()[0].right_bar.is_some());
    }

    #[test]
    fn test_overlay_in_last_measure() {
        let tune = parse_tune("X:1\nK:C\nAB&CD\n");
        assert_eq!(
            summary(&tune, tune.measures()),
            vec![("AB".to_string(), vec!["CD".to_string()])]
        );
        assert_eq!(tune.measures()[0].right_bar, None);
    }

    #[test]
    fn test_overlay_over_several_measures() {
        let tune = parse_tune("X:1\nK:C\nAB|CD&&EF|GA|B|\n");
        assert_eq!(
            summary(&tune, tune.measures()),
            vec![
                ("AB".to_string(), vec!["EF".to_string()]),
                ("CD".to_string(), vec!["GA".to_string()]),
                ("B".to_string(), vec![]),
            ]
        );
    }

    #[test]
    fn test_part_measures() {
        let tune = parse_tune("X:1\nK:C\nP:A\nAB|C|\nP:B\nDE|\n");
        assert_eq!(tune.part("A").unwrap().measures.len(), 2);
        assert_eq!(tune.part("B").unwrap().measures.len(), 1);
    }
}
