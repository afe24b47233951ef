use serde::{Serialize, Serializer};
use std::fmt;

/// Text from a field or annotation with ABC escapes decoded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextString {
    raw: String,
    decoded: String,
}

impl TextString {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            decoded: decode(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.decoded
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Appends continuation text separated by a space.
    pub fn append(&mut self, raw: &str) {
        if !self.raw.is_empty() {
            self.raw.push(' ');
        }
        self.raw.push_str(raw);
        self.decoded = decode(&self.raw);
    }
}

impl fmt::Display for TextString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.decoded)
    }
}

impl Serialize for TextString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.decoded)
    }
}

// Pairs of base letter and accented letter, per accent mnemonic.
const ACCENTS: &[(char, &str)] = &[
    ('`', "AÀEÈIÌOÒUÙaàeèiìoòuù"),
    ('\'', "AÁEÉIÍOÓUÚYÝaáeéiíoóuúyýCĆcćNŃnńSŚsśZŹzź"),
    ('^', "AÂEÊIÎOÔUÛaâeêiîoôuû"),
    ('"', "AÄEËIÏOÖUÜaäeëiïoöuüyÿ"),
    ('~', "AÃNÑOÕaãnñoõ"),
    ('o', "AÅaåUŮuů"),
    (',', "CÇcçSŞsş"),
    ('/', "OØoøLŁlł"),
    ('v', "CČcčSŠsšZŽzžEĚeěRŘrř"),
    ('=', "AĀaāEĒeēIĪiīOŌoōUŪuū"),
];

fn accented(accent: char, base: char) -> Option<char> {
    let (_, pairs) = ACCENTS.iter().find(|(a, _)| *a == accent)?;
    let chars: Vec<char> = pairs.chars().collect();
    chars
        .chunks(2)
        .find(|pair| pair[0] == base)
        .map(|pair| pair[1])
}

fn entity_accent(name: &str) -> Option<char> {
    match name {
        "uml" => Some('"'),
        "acute" => Some('\''),
        "grave" => Some('`'),
        "circ" => Some('^'),
        "tilde" => Some('~'),
        "ring" => Some('o'),
        "cedil" => Some(','),
        "slash" => Some('/'),
        "caron" => Some('v'),
        "macr" => Some('='),
        _ => None,
    }
}

fn decode_entity(name: &str) -> Option<String> {
    let named = match name {
        "amp" => Some("&"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "quot" => Some("\""),
        "apos" => Some("'"),
        "nbsp" => Some("\u{a0}"),
        "copy" => Some("©"),
        "szlig" => Some("ß"),
        "AElig" => Some("Æ"),
        "aelig" => Some("æ"),
        "OElig" => Some("Œ"),
        "oelig" => Some("œ"),
        _ => None,
    };
    if let Some(s) = named {
        return Some(s.to_string());
    }
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let mut chars = name.chars();
    let base = chars.next()?;
    let accent = entity_accent(chars.as_str())?;
    accented(accent, base).map(String::from)
}

fn decode(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            let next = chars[i + 1];
            if next == 'u' && i + 6 <= chars.len() {
                let hex: String = chars[i + 2..i + 6].iter().collect();
                if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(ch);
                    i += 6;
                    continue;
                }
            }
            if i + 2 < chars.len() {
                let pair: String = chars[i + 1..i + 3].iter().collect();
                let ligature = match pair.as_str() {
                    "ss" => Some('ß'),
                    "AE" => Some('Æ'),
                    "ae" => Some('æ'),
                    "OE" => Some('Œ'),
                    "oe" => Some('œ'),
                    _ => None,
                };
                if let Some(ch) = ligature.or_else(|| accented(next, chars[i + 2])) {
                    out.push(ch);
                    i += 3;
                    continue;
                }
            }
            match next {
                '\\' | '%' | '&' | '"' => {
                    out.push(next);
                    i += 2;
                    continue;
                }
                _ => {}
            }
        } else if c == '&' {
            if let Some(len) = chars[i + 1..].iter().take(10).position(|ch| *ch == ';') {
                let name: String = chars[i + 1..i + 1 + len].iter().collect();
                if let Some(s) = decode_entity(&name) {
                    out.push_str(&s);
                    i += len + 2;
                    continue;
                }
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backslash_escapes() {
        assert_eq!(TextString::new("Caf\\'e").as_str(), "Café");
        assert_eq!(TextString::new("M\\\"uller").as_str(), "Müller");
        assert_eq!(TextString::new("Stra\\sse").as_str(), "Straße");
        assert_eq!(TextString::new("\\oA").as_str(), "Å");
        assert_eq!(TextString::new("\\u00e9t\\u00e9").as_str(), "été");
        assert_eq!(TextString::new("100\\%").as_str(), "100%");
    }

    #[test]
    fn test_entities() {
        assert_eq!(TextString::new("J&ouml;rg").as_str(), "Jörg");
        assert_eq!(TextString::new("Tom &amp; Jerry").as_str(), "Tom & Jerry");
        assert_eq!(TextString::new("&#233;").as_str(), "é");
        assert_eq!(TextString::new("fish & chips").as_str(), "fish & chips");
    }

    #[test]
    fn test_append_keeps_raw() {
        let mut t = TextString::new("The Kesh");
        t.append("Jig");
        assert_eq!(t.as_str(), "The Kesh Jig");
        assert_eq!(t.raw(), "The Kesh Jig");
        assert_eq!(TextString::new("plain").to_string(), "plain");
    }
}
