use anyhow::{Result, anyhow, bail};
use num_rational::Ratio;

/// Exact note length measured in whole notes.
pub type Duration = Ratio<i64>;

pub fn duration(numer: i64, denom: i64) -> Duration {
    Ratio::new(numer, denom)
}

pub fn one() -> Duration {
    Ratio::from_integer(1)
}

/// Largest numerator or denominator a written length may reduce to.
const MAX_LENGTH_TERM: i64 = 1 << 16;

/// Product of two lengths, or `None` when it does not fit an `i64` ratio.
pub fn checked_mul(a: Duration, b: Duration) -> Option<Duration> {
    let wide = Ratio::new(
        i128::from(*a.numer()) * i128::from(*b.numer()),
        i128::from(*a.denom()) * i128::from(*b.denom()),
    );
    Some(Ratio::new_raw(
        i64::try_from(*wide.numer()).ok()?,
        i64::try_from(*wide.denom()).ok()?,
    ))
}

fn check_terms(length: Duration, s: &str) -> Result<Duration> {
    if *length.numer() > MAX_LENGTH_TERM || *length.denom() > MAX_LENGTH_TERM {
        bail!("Length \"{}\" is out of range", s);
    }
    Ok(length)
}

/// Parses the length suffix that follows a note, rest or chord.
///
/// The empty string is a length of one unit. A bare `/` halves the length,
/// so `/` is 1/2, `//` is 1/4 and `3/` is 3/2.
pub fn parse_multiplier(s: &str) -> Result<Duration> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    let mut length = if digits.is_empty() {
        one()
    } else {
        let numer: i64 = digits
            .parse()
            .map_err(|_| anyhow!("Invalid length \"{}\"", s))?;
        if numer == 0 {
            bail!("Zero length \"{}\"", s);
        }
        Ratio::from_integer(numer)
    };

    let mut rest = &s[digits.len()..];
    while let Some(after) = rest.strip_prefix('/') {
        let denom: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        let d: i64 = if denom.is_empty() {
            2
        } else {
            denom
                .parse()
                .map_err(|_| anyhow!("Invalid length \"{}\"", s))?
        };
        if d == 0 {
            bail!("Zero denominator in length \"{}\"", s);
        }
        length = checked_mul(length, Ratio::new(1, d))
            .ok_or_else(|| anyhow!("Length \"{}\" is out of range", s))?;
        rest = &after[denom.len()..];
    }

    if !rest.is_empty() {
        bail!("Invalid length \"{}\"", s);
    }
    check_terms(length, s)
}

/// Parses a plain `n/d` fraction as written in L: and Q: fields.
pub fn parse_fraction(s: &str) -> Result<Duration> {
    let s = s.trim();
    let (numer, denom) = match s.split_once('/') {
        Some((n, d)) => (n.trim(), d.trim()),
        None => (s, "1"),
    };
    let numer: i64 = numer
        .parse()
        .map_err(|_| anyhow!("Invalid fraction \"{}\"", s))?;
    let denom: i64 = denom
        .parse()
        .map_err(|_| anyhow!("Invalid fraction \"{}\"", s))?;
    if denom == 0 {
        bail!("Zero denominator in \"{}\"", s);
    }
    if numer <= 0 || denom < 0 {
        bail!("Fraction \"{}\" is not positive", s);
    }
    check_terms(Ratio::new(numer, denom), s)
}
