use crate::error::DiagnosticKind;
use crate::types::duration::{Duration, parse_fraction};
use crate::types::field::{Field, FieldValue, Stem, VoiceSpec, is_known_field};
use crate::types::instruction::Instruction;
use crate::types::key::{Key, is_accidental_token};
use crate::types::meter::Meter;
use crate::types::tempo::Tempo;
use crate::types::text::TextString;
use anyhow::{Result, anyhow, bail};

/// Characters a U: field may redefine.
pub fn is_user_symbol(c: char) -> bool {
    c == '~' || c == '.' || ('H'..='W').contains(&c) || ('h'..='w').contains(&c)
}

/// Parses the text after `id:` into a field.
///
/// Header and body P: fields mean different things and are told apart by
/// `in_body`; inline fields are always body fields.
pub fn parse_field(
    id: char,
    value: &str,
    in_body: bool,
    warnings: &mut Vec<DiagnosticKind>,
) -> Result<Field> {
    let raw = value.to_string();
    let value = value.trim();

    let parsed = match id {
        'X' => FieldValue::RefNumber(
            value
                .parse()
                .map_err(|_| anyhow!("X: value \"{}\" is not an integer", value))?,
        ),
        'K' => FieldValue::Key(Key::parse(value, warnings)?),
        'M' => FieldValue::Meter(value.parse::<Meter>()?),
        'L' => {
            let length = parse_fraction(value)?;
            if length <= Duration::from_integer(0) {
                bail!("Unit note length must be positive");
            }
            FieldValue::UnitNoteLength(length)
        }
        'Q' => FieldValue::Tempo(value.parse::<Tempo>()?),
        'V' => FieldValue::Voice(parse_voice(value, warnings)?),
        'P' if in_body => {
            let part = value
                .split_whitespace()
                .next()
                .ok_or_else(|| anyhow!("Empty P: field"))?;
            FieldValue::Part(part.to_string())
        }
        'P' => FieldValue::PlayOrder(expand_play_order(value)?),
        'I' => FieldValue::Instruction(Instruction::parse(value)?),
        'U' => parse_user_symbol(value)?,
        'm' => {
            let (target, replacement) = value
                .split_once('=')
                .ok_or_else(|| anyhow!("Macro \"{}\" has no replacement", value))?;
            let target = target.trim();
            if target.is_empty() {
                bail!("Empty macro target");
            }
            FieldValue::Macro {
                target: target.to_string(),
                replacement: replacement.trim().to_string(),
            }
        }
        _ => {
            if !is_known_field(id) {
                warnings.push(DiagnosticKind::UnknownField(id));
            }
            FieldValue::Text(TextString::new(value))
        }
    };

    Ok(Field {
        id,
        value: parsed,
        raw,
        inline: false,
    })
}

fn parse_user_symbol(value: &str) -> Result<FieldValue> {
    let (symbol, decoration) = value
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid U: field \"{}\"", value))?;
    let mut chars = symbol.trim().chars();
    let symbol = match (chars.next(), chars.next()) {
        (Some(c), None) if is_user_symbol(c) => c,
        _ => bail!("Symbol \"{}\" cannot be redefined", symbol.trim()),
    };
    let decoration = decoration.trim();
    let name = decoration
        .strip_prefix('!')
        .and_then(|d| d.strip_suffix('!'))
        .or_else(|| decoration.strip_prefix('+').and_then(|d| d.strip_suffix('+')))
        .unwrap_or(decoration);
    let decoration = match name {
        "nil" | "none" | "" => None,
        _ => Some(name.to_string()),
    };
    Ok(FieldValue::UserSymbol { symbol, decoration })
}

/// `name =` followed by a value, or `name` followed by `=value`. A natural
/// like `=b` stays a token of its own.
fn joins(last: &str, token: &str) -> bool {
    if last.ends_with('=') {
        return true;
    }
    token.starts_with('=')
        && !is_accidental_token(token)
        && last.ends_with(|c: char| c.is_alphanumeric() || c == '_')
}

/// Splits attribute text on whitespace outside quotes, joining `a = b`.
pub(crate) fn attribute_tokens(s: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in s.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    let mut joined: Vec<String> = Vec::new();
    for token in tokens {
        match joined.last_mut() {
            Some(last) if joins(last, &token) => last.push_str(&token),
            _ => joined.push(token),
        }
    }
    joined
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

pub fn parse_voice(value: &str, warnings: &mut Vec<DiagnosticKind>) -> Result<VoiceSpec> {
    let tokens = attribute_tokens(value);
    let Some((id, attributes)) = tokens.split_first() else {
        bail!("V: field has no voice id");
    };
    let mut spec = VoiceSpec::new(id);
    let mut clef_key = Key::none();

    for token in attributes {
        if let Some((name, value)) = token.split_once('=') {
            match name {
                "name" | "nm" => {
                    spec.name = Some(TextString::new(unquote(value)));
                    continue;
                }
                "subname" | "snm" => {
                    spec.subname = Some(TextString::new(unquote(value)));
                    continue;
                }
                "stem" => {
                    spec.stem = Some(match value {
                        "up" => Stem::Up,
                        "down" => Stem::Down,
                        "auto" => Stem::Auto,
                        _ => bail!("Invalid stem direction \"{}\"", value),
                    });
                    continue;
                }
                _ => {}
            }
        }
        clef_key.apply_token(token, warnings)?;
    }
    spec.clef = clef_key.clef;
    Ok(spec)
}

/// Expands a header P: field such as `A2B(AC)2` into the parts in play
/// order.
pub fn expand_play_order(s: &str) -> Result<Vec<String>> {
    let chars: Vec<char> = s.chars().collect();
    let mut pos = 0;
    let order = expand_group(&chars, &mut pos)?;
    if pos < chars.len() {
        bail!("Unbalanced ) in part order \"{}\"", s);
    }
    Ok(order)
}

/// Upper bound on repeat counts and on the length of an expanded play order.
const MAX_REPEAT: usize = 1000;

fn read_count(chars: &[char], pos: &mut usize) -> Result<usize> {
    let start = *pos;
    while *pos < chars.len() && chars[*pos].is_ascii_digit() {
        *pos += 1;
    }
    if start == *pos {
        return Ok(1);
    }
    let digits: String = chars[start..*pos].iter().collect();
    match digits.parse::<usize>() {
        Ok(count) if count <= MAX_REPEAT => Ok(count),
        _ => bail!("Repeat count {} in part order is too large", digits),
    }
}

fn repeat(order: &mut Vec<String>, parts: &[String], count: usize) -> Result<()> {
    if order.len() + parts.len() * count > MAX_REPEAT {
        bail!("Part order expands to more than {} parts", MAX_REPEAT);
    }
    for _ in 0..count {
        order.extend(parts.iter().cloned());
    }
    Ok(())
}

fn expand_group(chars: &[char], pos: &mut usize) -> Result<Vec<String>> {
    let mut order = Vec::new();
    while *pos < chars.len() {
        let c = chars[*pos];
        match c {
            'A'..='Z' => {
                *pos += 1;
                let count = read_count(chars, pos)?;
                repeat(&mut order, &[c.to_string()], count)?;
            }
            '(' => {
                *pos += 1;
                let inner = expand_group(chars, pos)?;
                if chars.get(*pos) != Some(&')') {
                    bail!("Unbalanced ( in part order");
                }
                *pos += 1;
                let count = read_count(chars, pos)?;
                repeat(&mut order, &inner, count)?;
            }
            ')' => return Ok(order),
            '.' | ' ' | '\t' => *pos += 1,
            _ => bail!("Invalid character '{}' in part order", c),
        }
    }
    Ok(order)
}
