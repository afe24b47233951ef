//! Resolution passes run over a tune once its body has been tokenized.

pub mod accidentals;
pub mod alignment;
pub mod beams;
pub mod broken_rhythm;
pub mod clefs;
pub mod duration;
pub mod measures;
pub mod midi;
pub mod partition;
pub mod redefinable;
pub mod ties;
pub mod tuplet;

use crate::tune::Tune;
use crate::types::element::{Element, ElementId};

pub fn postprocess(tune: &mut Tune) {
    // order is important here

    partition::transform(tune);
    log::debug!("X:{}: {} voices, {} parts", tune.refnum, tune.voices.len(), tune.parts.len());

    duration::transform(tune);
    broken_rhythm::transform(tune);
    tuplet::transform(tune);
    ties::transform(tune);
    beams::transform(tune);
    accidentals::transform(tune);
    clefs::transform(tune);

    measures::transform(tune);
    log::debug!("X:{}: {} measures in first voice", tune.refnum, tune.measures().len());

    alignment::transform(tune);
    redefinable::transform(tune);
    midi::transform(tune);
}

/// Element ids of every voice, in voice order.
pub(crate) fn voice_element_ids(tune: &Tune) -> Vec<Vec<ElementId>> {
    tune.voices.iter().map(|v| v.elements.clone()).collect()
}

/// Grace-note items of a music unit, if it has any.
pub(crate) fn grace_items_mut(element: &mut Element) -> Option<&mut Vec<Element>> {
    element
        .as_unit_mut()?
        .unit_mut()
        .grace_notes
        .as_mut()
        .map(|g| &mut g.items)
}

pub(crate) fn sync_chord(element: &mut Element) {
    if let Element::Chord(chord) = element {
        chord.sync_members();
    }
}
