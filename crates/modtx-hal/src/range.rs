//! Parameter ranges and attribute-text parsing
//!
//! The attribute bus reports tuning limits as human-readable text like
//! `"[46875001 1 6000000000]"` (min, step, max) or `"[-89.75]"` (a
//! single limit). The scans here turn that text into typed ranges; the
//! rest of the HAL only ever manipulates the typed form.

use serde::{Deserialize, Serialize};

/// Closed integer interval `{min, step, max}`.
///
/// `step == 0` pins the range to a single value with `min == max`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeI64 {
    pub min: i64,
    pub step: i64,
    pub max: i64,
}

impl RangeI64 {
    pub const fn new(min: i64, step: i64, max: i64) -> Self {
        Self { min, step, max }
    }

    /// A range pinned to one value.
    pub const fn pinned(value: i64) -> Self {
        Self {
            min: value,
            step: 0,
            max: value,
        }
    }

    pub const fn is_pinned(&self) -> bool {
        self.min == self.max
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }

    /// `min <= max` and `0 <= step <= max - min`.
    pub fn is_valid(&self) -> bool {
        self.min <= self.max && self.step >= 0 && self.step <= self.max - self.min
    }
}

/// Closed floating-point interval `{min, step, max}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeF64 {
    pub min: f64,
    pub step: f64,
    pub max: f64,
}

impl RangeF64 {
    pub const fn new(min: f64, step: f64, max: f64) -> Self {
        Self { min, step, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Strip one layer of `[...]` brackets if present.
fn strip_brackets(text: &str) -> &str {
    let text = text.trim();
    match text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        Some(inner) => inner,
        None => text,
    }
}

/// Parse `"[min step max]"` into an integer range. Fractional attribute
/// text is truncated the way the bus reports it.
pub fn parse_i64_range(text: &str) -> Option<RangeI64> {
    let tokens: Vec<&str> = strip_brackets(text).split_whitespace().collect();
    if tokens.len() != 3 {
        return None;
    }

    let range = RangeI64 {
        min: parse_i64(tokens[0])?,
        step: parse_i64(tokens[1])?,
        max: parse_i64(tokens[2])?,
    };

    range.is_valid().then_some(range)
}

/// Parse a single bracketed limit like `"[-89.75]"`.
pub fn parse_f64_limit(text: &str) -> Option<f64> {
    let tokens: Vec<&str> = strip_brackets(text).split_whitespace().collect();
    if tokens.len() != 1 {
        return None;
    }
    tokens[0].parse().ok()
}

/// Whitespace-separated token at `index`, as a float. Gain attributes
/// read back as `"-10.00 dB"`, hence the indexed access.
pub fn token_f64(text: &str, index: usize) -> Option<f64> {
    text.split_whitespace().nth(index)?.parse().ok()
}

fn parse_i64(token: &str) -> Option<i64> {
    // attribute text may carry a decimal point even for integer values
    token
        .parse::<i64>()
        .ok()
        .or_else(|| token.parse::<f64>().ok().map(|v| v as i64))
}
