use crate::parser::parse;
use crate::tune::Tune;
use crate::types::duration::Duration;

/// Parses text holding one tune and returns it with every pass applied.
/// Panics when the text does not parse.
pub fn parse_tune(text: &str) -> Tune {
    let mut book = parse(text).expect("Failed to parse input");
    assert!(!book.tunes.is_empty(), "no tune in input {:?}", text);
    book.tunes.remove(0)
}

/// Sounding height of every note, chord members excluded.
pub fn note_heights(tune: &Tune) -> Vec<i32> {
    tune.notes().iter().map(|n| n.height()).collect()
}

/// Resolved duration of every music unit in source order.
pub fn unit_durations(tune: &Tune) -> Vec<Duration> {
    tune.items
        .iter()
        .filter_map(|i| i.element.as_unit())
        .map(|u| u.duration())
        .collect()
}
