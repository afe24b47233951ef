use super::voice_element_ids;
use crate::tune::Tune;
use crate::types::element::{AlignToken, Element, ElementId};
use crate::types::unit::{Embellishment, Lyric, UnitState};

/// Where the next line of one kind (lyrics or symbols) picks up.
#[derive(Default)]
struct AlignState {
    /// Position in the voice of the next note to attach to.
    cursor: usize,
    /// Where the current stack of consecutive lines started.
    start: usize,
    verse: usize,
    /// Position of the last line of this kind.
    last_line: Option<usize>,
}

/// A voice's element list, seen from an alignment line at `limit`.
struct Targets<'a> {
    tune: &'a Tune,
    ids: &'a [ElementId],
    limit: usize,
}

impl Targets<'_> {
    fn element(&self, pos: usize) -> &Element {
        &self.tune.items[self.ids[pos]].element
    }

    fn is_target(&self, pos: usize) -> bool {
        self.element(pos)
            .as_unit()
            .is_some_and(|u| u.is_alignment_target())
    }

    fn next_target(&self, from: usize) -> Option<usize> {
        (from..self.limit).find(|&pos| self.is_target(pos))
    }

    /// Moves past `count` notes.
    fn advance(&self, mut cursor: usize, count: usize) -> usize {
        for _ in 0..count {
            match self.next_target(cursor) {
                Some(pos) => cursor = pos + 1,
                None => return self.limit,
            }
        }
        cursor
    }

    /// No note between the last hard bar (or the start of the voice) and
    /// `cursor`.
    fn at_measure_start(&self, cursor: usize) -> bool {
        for pos in (0..cursor).rev() {
            if self.is_target(pos) {
                return false;
            }
            if self.element(pos).is_hard_bar() {
                return true;
            }
        }
        true
    }

    fn skip_bar(&self, cursor: usize) -> usize {
        if self.at_measure_start(cursor) {
            return cursor;
        }
        match (cursor..self.limit).find(|&pos| self.element(pos).is_hard_bar()) {
            Some(pos) => pos + 1,
            None => self.limit,
        }
    }

    /// Something that ends a stack of alignment lines lies between the two
    /// positions.
    fn music_between(&self, from: usize, to: usize) -> bool {
        (from..to).any(|pos| {
            let element = self.element(pos);
            element.is_unit() || matches!(element, Element::BarLine(_))
        })
    }
}

/// Walks one alignment line, calling `attach` with the element id of each
/// note that receives a token.
fn align<T: Clone>(
    targets: &Targets,
    state: &mut AlignState,
    pos: usize,
    continuation: bool,
    tokens: &[AlignToken<T>],
    note_count: impl Fn(&T) -> usize,
    mut attach: impl FnMut(ElementId, T, usize),
) {
    if !continuation {
        let consecutive = state
            .last_line
            .is_some_and(|last| !targets.music_between(last + 1, pos));
        if consecutive {
            state.cursor = state.start;
            state.verse += 1;
        } else {
            state.verse = 0;
            state.start = state.cursor;
        }
    }
    state.last_line = Some(pos);

    let mut cursor = state.cursor;
    for token in tokens {
        cursor = match token {
            AlignToken::SkipNote | AlignToken::Blank => targets.advance(cursor, 1),
            AlignToken::Bar => targets.skip_bar(cursor),
            AlignToken::Item(item) => match targets.next_target(cursor) {
                Some(target) => {
                    attach(targets.ids[target], item.clone(), state.verse);
                    targets.advance(target + 1, note_count(item).saturating_sub(1))
                }
                None => {
                    log::debug!("Alignment line has more tokens than notes");
                    break;
                }
            },
        };
    }
    state.cursor = cursor;
}

enum Attachment {
    Lyric(Lyric, usize),
    Symbol(Embellishment),
}

fn apply(state: &mut UnitState, attachment: Attachment) {
    match attachment {
        Attachment::Lyric(mut lyric, verse) => {
            lyric.verse = verse;
            state.set_lyric(verse, lyric);
        }
        Attachment::Symbol(embellishment) => state.embellishments.push(embellishment),
    }
}

/// Attaches w: syllables and s: symbols to the notes and chords before
/// them in the same voice.
///
/// Lines of one kind with no music in between stack onto the same notes,
/// lyrics as further verses. A `+:` continuation carries on where the
/// line before it stopped. Otherwise a line starts after the last note the
/// previous line of its kind reached.
pub fn transform(tune: &mut Tune) {
    for ids in voice_element_ids(tune) {
        let mut attachments: Vec<(ElementId, Attachment)> = Vec::new();
        let mut lyrics = AlignState::default();
        let mut symbols = AlignState::default();

        for (pos, id) in ids.iter().enumerate() {
            let targets = Targets {
                tune,
                ids: &ids,
                limit: pos,
            };
            match &tune.items[*id].element {
                Element::LyricsLine(line) => align(
                    &targets,
                    &mut lyrics,
                    pos,
                    line.continuation,
                    &line.tokens,
                    Lyric::note_count,
                    |target, lyric, verse| {
                        attachments.push((target, Attachment::Lyric(lyric, verse)))
                    },
                ),
                Element::SymbolLine(line) => align(
                    &targets,
                    &mut symbols,
                    pos,
                    line.continuation,
                    &line.tokens,
                    |_| 1,
                    |target, symbol, _| attachments.push((target, Attachment::Symbol(symbol))),
                ),
                _ => {}
            }
        }

        for (target, attachment) in attachments {
            if let Some(unit) = tune.items[target].element.as_unit_mut() {
                apply(unit.unit_mut(), attachment);
            }
        }
    }
}
