use crate::types::duration::{Duration, parse_fraction, parse_multiplier};
use crate::types::text::TextString;
use anyhow::{Result, anyhow};
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Tempo {
    /// Beat lengths summed into one beat, e.g. `1/4 3/8`. Empty when the
    /// legacy form counts in unit note lengths.
    pub beats: Vec<Duration>,
    /// Legacy `C2=120` multiplier of the unit note length.
    pub unit_multiplier: Option<Duration>,
    pub bpm: Option<u32>,
    pub label: Option<TextString>,
    pub post_label: Option<TextString>,
}

impl Tempo {
    pub fn beat_length(&self) -> Option<Duration> {
        if self.beats.is_empty() {
            None
        } else {
            Some(self.beats.iter().copied().sum())
        }
    }
}

impl FromStr for Tempo {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut tempo = Tempo::default();
        let mut plain = String::new();
        let mut labels = Vec::new();
        let mut rest = s;
        while let Some(open) = rest.find('"') {
            plain.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after
                .find('"')
                .ok_or_else(|| anyhow!("Unterminated tempo label in \"{}\"", s))?;
            labels.push((plain.trim().is_empty(), TextString::new(&after[..close])));
            rest = &after[close + 1..];
        }
        plain.push_str(rest);

        for (before_value, label) in labels {
            if before_value && tempo.label.is_none() {
                tempo.label = Some(label);
            } else {
                tempo.post_label = Some(label);
            }
        }

        let plain = plain.trim();
        if plain.is_empty() {
            return Ok(tempo);
        }

        match plain.split_once('=') {
            Some((beats, bpm)) => {
                tempo.bpm = Some(
                    bpm.trim()
                        .parse()
                        .map_err(|_| anyhow!("Invalid tempo \"{}\"", s))?,
                );
                let beats = beats.trim();
                if let Some(mult) = beats.strip_prefix(['C', 'L']) {
                    tempo.unit_multiplier = Some(parse_multiplier(mult)?);
                } else {
                    for beat in beats.split_whitespace() {
                        tempo.beats.push(parse_fraction(beat)?);
                    }
                }
            }
            None => {
                tempo.bpm = Some(
                    plain
                        .parse()
                        .map_err(|_| anyhow!("Invalid tempo \"{}\"", s))?,
                );
            }
        }
        Ok(tempo)
    }
}
