//! Assigns every body element to a voice and a part.
//!
//! Voices declared in the header come first, in declaration order. Content
//! met before any V: or P: marker goes to the first declared voice, or to
//! an implicit voice (and part) with the empty id.

use crate::tune::Tune;
use crate::types::element::Element;
use crate::types::field::{FieldValue, VoiceSpec};
use crate::types::instruction::Instruction;
use crate::types::voice::{Part, Voice};

fn voice_index(voices: &mut Vec<Voice>, spec: &VoiceSpec) -> usize {
    match voices.iter().position(|v| v.id == spec.id) {
        Some(idx) => idx,
        None => {
            voices.push(Voice::from_spec(spec));
            voices.len() - 1
        }
    }
}

fn part_index(parts: &mut Vec<Part>, id: &str) -> usize {
    match parts.iter().position(|p| p.id == id) {
        Some(idx) => idx,
        None => {
            parts.push(Part::new(id));
            parts.len() - 1
        }
    }
}

pub fn transform(tune: &mut Tune) {
    let mut voices: Vec<Voice> = tune.header.voices().iter().map(Voice::from_spec).collect();
    let mut parts: Vec<Part> = Vec::new();
    let mut staves = tune
        .header
        .instructions()
        .into_iter()
        .rev()
        .find_map(|i| match i {
            Instruction::Staves(s) => Some(s),
            _ => None,
        });
    let mut voice: Option<usize> = None;
    let mut part: Option<usize> = None;

    for id in 0..tune.items.len() {
        if let Element::Field(field) = &tune.items[id].element {
            match &field.value {
                FieldValue::Voice(spec) => {
                    let idx = voice_index(&mut voices, spec);
                    voices[idx].update(spec);
                    voice = Some(idx);
                }
                FieldValue::Part(name) => part = Some(part_index(&mut parts, name)),
                FieldValue::Instruction(Instruction::Staves(s)) => staves = Some(s.clone()),
                _ => {}
            }
        }

        let v = match voice {
            Some(v) => v,
            None => {
                if voices.is_empty() {
                    voices.push(Voice::new(""));
                }
                voice = Some(0);
                0
            }
        };
        let p = match part {
            Some(p) => p,
            None => {
                let p = part_index(&mut parts, "");
                part = Some(p);
                p
            }
        };

        voices[v].elements.push(id);
        parts[p].elements.push(id);
        let item = &mut tune.items[id];
        item.voice_id = voices[v].id.clone();
        item.part_id = parts[p].id.clone();
    }

    tune.voices = voices;
    tune.parts = parts;
    tune.staves = staves;
}

#[cfg(test)]
mod tests {
    use crate::types::clef::ClefKind;
    use crate::util::parse_tune;
    use pretty_assertions::assert_eq;

    fn voice_letters(tune: &crate::tune::Tune, id: &str) -> String {
        tune.voice_elements(id)
            .iter()
            .filter_map(|e| e.as_note())
            .map(|n| n.pitch.note)
            .collect()
    }

    #[test]
    fn test_voices() {
        let tune = parse_tune(
            "X:1\nV:1 clef=bass\nV:2 name=Second\nK:C\nV:1\nCDE\nV:2\nFGA\nV:1 name=Upper clef=treble\nB\n",
        );
        let ids: Vec<&str> = tune.voices.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(voice_letters(&tune, "1"), "CDEB");
        assert_eq!(voice_letters(&tune, "2"), "FGA");

        let upper = tune.voice("1").unwrap();
        assert_eq!(upper.name.as_ref().map(|n| n.as_str()), Some("Upper"));
        // a clef after the voice has content is a clef change, not the
        // voice's starting clef
        assert_eq!(upper.clef.as_ref().map(|c| c.kind), Some(ClefKind::Bass));
        assert_eq!(
            tune.voice("2").unwrap().name.as_ref().map(|n| n.as_str()),
            Some("Second")
        );
        for item in &tune.items {
            assert!(item.voice_id == "1" || item.voice_id == "2");
        }
    }

    #[test]
    fn test_implicit_voice() {
        let tune = parse_tune("X:1\nK:C\nabc\nV:2\nde\n");
        let ids: Vec<&str> = tune.voices.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["", "2"]);
        assert_eq!(voice_letters(&tune, ""), "ABC");
        assert_eq!(voice_letters(&tune, "2"), "DE");
    }

    #[test]
    fn test_parts() {
        let tune = parse_tune("X:1\nP:AB\nK:C\nP:A\nab\nP:B\ncd\nP:A\ne\n");
        let ids: Vec<&str> = tune.parts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        let part_notes = |id: &str| {
            tune.part(id)
                .unwrap()
                .elements
                .iter()
                .filter(|i| tune.element(**i).as_note().is_some())
                .count()
        };
        assert_eq!(part_notes("A"), 3);
        assert_eq!(part_notes("B"), 2);
        assert_eq!(tune.header.play_order().unwrap().to_vec(), vec!["A", "B"]);
    }

    #[test]
    fn test_long_voice_id_is_truncated() {
        let tune = parse_tune("X:1\nK:C\nV:abcdefghijklmnopqrstuvwxy\nabc\n");
        assert!(tune.voice("abcdefghijklmnopqrst").is_some());
        assert!(tune.voice("abcdefghijklmnopqrstuvwxy").is_none());
    }

    #[test]
    fn test_staves() {
        let tune = parse_tune("X:1\n%%score (1 2) 3\nV:1\nV:2\nV:3\nK:C\nV:1\na\n");
        let staves = tune.staves.as_ref().unwrap();
        assert_eq!(staves.staves.len(), 2);
        assert_eq!(staves.staff_of("2"), Some(0));
        assert_eq!(staves.staff_of("3"), Some(1));
    }
}
