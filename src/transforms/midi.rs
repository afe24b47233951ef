use crate::tune::Tune;
use crate::types::element::Element;
use crate::types::field::FieldValue;
use crate::types::instruction::{Instruction, MidiVoice};

fn voice_index(tune: &Tune, id: Option<&str>) -> Option<usize> {
    match id {
        Some(id) => tune.voices.iter().position(|v| v.id == id),
        None => (!tune.voices.is_empty()).then_some(0),
    }
}

fn apply(tune: &mut Tune, instruction: &Instruction, current: Option<&str>) {
    match instruction {
        Instruction::MidiVoice(midi) => {
            let target = midi.voice.as_deref().or(current);
            match voice_index(tune, target) {
                Some(index) => tune.voices[index].midi = Some(midi.clone()),
                None => log::warn!("MIDI voice for unknown voice \"{}\"", target.unwrap_or("")),
            }
        }
        Instruction::MidiProgram { program, .. } => {
            if let Some(index) = voice_index(tune, current) {
                let midi = tune.voices[index].midi.get_or_insert_with(MidiVoice::default);
                if midi.instrument.is_none() {
                    midi.instrument = Some(*program);
                }
            }
        }
        Instruction::MidiChordProgram(program) => tune.chord_program = Some(*program),
        _ => {}
    }
}

/// Assigns `%%MIDI` instruments to voices, header directives first, then
/// body directives in the voice they occur in.
pub fn transform(tune: &mut Tune) {
    for instruction in tune.header.instructions() {
        apply(tune, &instruction, None);
    }

    let body: Vec<(Instruction, String)> = tune
        .items
        .iter()
        .filter_map(|item| match &item.element {
            Element::Field(field) => match &field.value {
                FieldValue::Instruction(instruction) => {
                    Some((instruction.clone(), item.voice_id.clone()))
                }
                _ => None,
            },
            _ => None,
        })
        .collect();
    for (instruction, voice) in body {
        apply(tune, &instruction, Some(&voice));
    }
}
