//! Tokenizers for the two alignment lines: `w:` lyrics and `s:` symbols.

use crate::field_parser::is_user_symbol;
use crate::types::element::AlignToken;
use crate::types::unit::{Decoration, Embellishment, Lyric};
use anyhow::{Result, bail};

fn finish_syllable(syllable: &mut Option<String>, tokens: &mut Vec<AlignToken<Lyric>>) {
    if let Some(text) = syllable.take() {
        tokens.push(AlignToken::Item(Lyric::new(&text)));
    }
}

fn last_lyric(tokens: &mut [AlignToken<Lyric>]) -> Option<&mut Lyric> {
    match tokens.last_mut() {
        Some(AlignToken::Item(lyric)) => Some(lyric),
        _ => None,
    }
}

/// Parses the text of a `w:` line.
///
/// A `-` or `_` written against a syllable belongs to it; standing alone
/// after whitespace it skips a note, except that a single `-` after an
/// unhyphenated syllable still hyphenates it.
pub fn parse_lyrics(text: &str) -> Vec<AlignToken<Lyric>> {
    let mut tokens: Vec<AlignToken<Lyric>> = Vec::new();
    let mut syllable: Option<String> = None;
    // Whether the previous character belonged to the last syllable token.
    let mut attached = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' => {
                finish_syllable(&mut syllable, &mut tokens);
                attached = false;
            }
            '-' => {
                if syllable.is_some() {
                    finish_syllable(&mut syllable, &mut tokens);
                    if let Some(lyric) = last_lyric(&mut tokens) {
                        lyric.hyphen = true;
                        lyric.hyphen_length = 1;
                    }
                    attached = true;
                } else if attached {
                    if let Some(lyric) = last_lyric(&mut tokens) {
                        lyric.hyphen = true;
                        lyric.hyphen_length += 1;
                    }
                } else {
                    match last_lyric(&mut tokens) {
                        Some(lyric) if !lyric.hyphen => {
                            lyric.hyphen = true;
                            lyric.hyphen_length = 1;
                            attached = true;
                        }
                        _ => tokens.push(AlignToken::SkipNote),
                    }
                }
            }
            '_' => {
                if syllable.is_some() {
                    finish_syllable(&mut syllable, &mut tokens);
                    attached = true;
                }
                match last_lyric(&mut tokens) {
                    Some(lyric) if attached => lyric.stretch += 1,
                    _ => tokens.push(AlignToken::SkipNote),
                }
            }
            '*' => {
                finish_syllable(&mut syllable, &mut tokens);
                tokens.push(AlignToken::Blank);
                attached = false;
            }
            '|' => {
                finish_syllable(&mut syllable, &mut tokens);
                tokens.push(AlignToken::Bar);
                attached = false;
            }
            '~' => syllable.get_or_insert_with(String::new).push(' '),
            '\\' => {
                let text = syllable.get_or_insert_with(String::new);
                match chars.next() {
                    Some('-') => text.push('-'),
                    Some(next) => {
                        text.push('\\');
                        text.push(next);
                    }
                    None => text.push('\\'),
                }
            }
            _ => {
                if attached && syllable.is_none() {
                    attached = false;
                }
                syllable.get_or_insert_with(String::new).push(c);
            }
        }
    }
    finish_syllable(&mut syllable, &mut tokens);
    tokens
}

/// Parses the text of an `s:` line. `delimiter` is the active decoration
/// delimiter.
pub fn parse_symbols(text: &str, delimiter: char) -> Result<Vec<AlignToken<Embellishment>>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '*' => tokens.push(AlignToken::Blank),
            '|' => tokens.push(AlignToken::Bar),
            '"' => {
                let quoted: String = chars.by_ref().take_while(|c| *c != '"').collect();
                tokens.push(AlignToken::Item(Embellishment::from_quoted(&quoted)));
            }
            c if c == delimiter => {
                let mut name = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == delimiter {
                        closed = true;
                        break;
                    }
                    name.push(next);
                }
                if !closed {
                    bail!("Unterminated decoration \"{}{}\"", delimiter, name);
                }
                tokens.push(AlignToken::Item(Embellishment::Decoration(
                    Decoration::named(&name),
                )));
            }
            c if is_user_symbol(c) => {
                tokens.push(AlignToken::Item(Embellishment::Decoration(
                    Decoration::shorthand(c),
                )));
            }
            _ => bail!("Unexpected character '{}' in symbol line", c),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<String> {
        parse_lyrics(text)
            .into_iter()
            .map(|t| match t {
                AlignToken::Item(l) => format!(
                    "{}{}{}",
                    l.text,
                    "-".repeat(l.hyphen_length),
                    "_".repeat(l.stretch)
                ),
                AlignToken::SkipNote => "<skip>".to_string(),
                AlignToken::Blank => "*".to_string(),
                AlignToken::Bar => "|".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_syllables_and_hyphens() {
        assert_eq!(words("Sa-ys my la--dy"), vec!["Sa-", "ys", "my", "la--", "dy"]);
        assert_eq!(words("Hey - ho"), vec!["Hey-", "ho"]);
        assert_eq!(words("time__ flies"), vec!["time__", "flies"]);
        assert_eq!(words("time _ _ flies"), vec!["time", "<skip>", "<skip>", "flies"]);
        assert_eq!(words("a * b | c"), vec!["a", "*", "b", "|", "c"]);
        assert_eq!(words("of~the day"), vec!["of the", "day"]);
        assert_eq!(words("e\\-mail"), vec!["e-mail"]);
    }

    #[test]
    fn test_note_counts() {
        let tokens = parse_lyrics("la--dy long__");
        let counts: Vec<usize> = tokens
            .iter()
            .filter_map(|t| match t {
                AlignToken::Item(l) => Some(l.note_count()),
                _ => None,
            })
            .collect();
        assert_eq!(counts, vec![2, 1, 3]);
    }

    #[test]
    fn test_symbols() {
        let tokens = parse_symbols("* u !trill! \"Am\" | .", '!').unwrap();
        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[0], AlignToken::Blank);
        assert_eq!(
            tokens[1],
            AlignToken::Item(Embellishment::Decoration(Decoration::shorthand('u')))
        );
        assert_eq!(
            tokens[2],
            AlignToken::Item(Embellishment::Decoration(Decoration::named("trill")))
        );
        assert!(matches!(
            tokens[3],
            AlignToken::Item(Embellishment::ChordSymbol(_))
        ));
        assert_eq!(tokens[4], AlignToken::Bar);
        assert!(parse_symbols("!trill", '!').is_err());
        assert!(parse_symbols("a", '!').is_err());
        assert_eq!(parse_symbols("+p+", '+').unwrap().len(), 1);
    }
}
