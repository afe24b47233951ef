use crate::types::duration::{Duration, duration};
use anyhow::{Result, anyhow, bail};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Meter {
    Free,
    /// `C`, counted as 4/4.
    Common,
    /// `C|`, counted as 2/4.
    Cut,
    Simple { numerator: u32, denominator: u32 },
    /// Additive meter such as `2+3+2/8`.
    Complex { numerators: Vec<u32>, denominator: u32 },
}

impl Default for Meter {
    fn default() -> Self {
        Meter::Free
    }
}

impl Meter {
    pub fn numerator(&self) -> Option<u32> {
        match self {
            Meter::Free => None,
            Meter::Common => Some(4),
            Meter::Cut => Some(2),
            Meter::Simple { numerator, .. } => Some(*numerator),
            Meter::Complex { numerators, .. } => Some(numerators.iter().sum()),
        }
    }

    pub fn denominator(&self) -> Option<u32> {
        match self {
            Meter::Free => None,
            Meter::Common | Meter::Cut => Some(4),
            Meter::Simple { denominator, .. } | Meter::Complex { denominator, .. } => {
                Some(*denominator)
            }
        }
    }

    /// Length of one measure in whole notes.
    pub fn value(&self) -> Option<Duration> {
        Some(duration(
            self.numerator()? as i64,
            self.denominator()? as i64,
        ))
    }

    pub fn default_unit_note_length(&self) -> Duration {
        match self.value() {
            Some(v) if v < duration(3, 4) => duration(1, 16),
            _ => duration(1, 8),
        }
    }

    /// 6/8, 9/8, 12/8 and similar meters with triple subdivision.
    pub fn is_compound(&self) -> bool {
        self.numerator().is_some_and(|n| n > 3 && n % 3 == 0)
    }
}

impl FromStr for Meter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "" | "none" => return Ok(Meter::Free),
            "C" => return Ok(Meter::Common),
            "C|" => return Ok(Meter::Cut),
            _ => {}
        }
        let (numer, denom) = s
            .split_once('/')
            .ok_or_else(|| anyhow!("Invalid meter \"{}\"", s))?;
        let denominator: u32 = denom
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid meter denominator \"{}\"", s))?;
        if denominator == 0 {
            bail!("Invalid meter denominator \"{}\"", s);
        }
        let numer = numer.trim().trim_start_matches('(').trim_end_matches(')');
        let numerators = numer
            .split('+')
            .map(|n| {
                n.trim()
                    .parse::<u32>()
                    .map_err(|_| anyhow!("Invalid meter numerator \"{}\"", s))
            })
            .collect::<Result<Vec<u32>>>()?;
        if numerators.len() == 1 {
            Ok(Meter::Simple {
                numerator: numerators[0],
                denominator,
            })
        } else {
            Ok(Meter::Complex {
                numerators,
                denominator,
            })
        }
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Meter::Free => write!(f, "none"),
            Meter::Common => write!(f, "C"),
            Meter::Cut => write!(f, "C|"),
            Meter::Simple {
                numerator,
                denominator,
            } => write!(f, "{}/{}", numerator, denominator),
            Meter::Complex {
                numerators,
                denominator,
            } => {
                let parts: Vec<String> = numerators.iter().map(|n| n.to_string()).collect();
                write!(f, "{}/{}", parts.join("+"), denominator)
            }
        }
    }
}
