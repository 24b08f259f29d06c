//! Elevation formulas entered as free text.
//!
//! The dialog accepts linear expressions over the current elevation `H`,
//! such as `"H"`, `"H*0.5"`, `"H/2 - 50"`, or a bare constant `"-200"`.
//! Anything beyond a sum of linear terms is a user-input error.

use crate::error::{Error, Result};

/// A parsed linear elevation formula `H * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Formula {
    /// Multiplier applied to the current elevation.
    pub scale: f64,
    /// Constant added after scaling.
    pub offset: f64,
}

impl Formula {
    /// The identity formula `H`.
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
        }
    }

    /// A constant formula ignoring the input elevation.
    pub fn constant(value: f64) -> Self {
        Self {
            scale: 0.0,
            offset: value,
        }
    }

    /// Parses formula text.
    pub fn parse(text: &str) -> Result<Self> {
        let bad = |reason: &str| Error::BadFormula {
            text: text.to_string(),
            reason: reason.to_string(),
        };

        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(bad("empty formula"));
        }

        let mut scale = 0.0;
        let mut offset = 0.0;
        for term in split_terms(&compact).map_err(bad)? {
            let (term_scale, term_offset) = parse_term(term).map_err(bad)?;
            scale += term_scale;
            offset += term_offset;
        }
        Ok(Self { scale, offset })
    }

    /// Applies the formula to one elevation value. NaN stays NaN.
    pub fn apply(&self, elevation: f64) -> f64 {
        if elevation.is_nan() && self.scale != 0.0 {
            return f64::NAN;
        }
        elevation * self.scale + self.offset
    }
}

/// Splits `compact` into signed terms at top-level `+`/`-` boundaries.
fn split_terms(compact: &str) -> std::result::Result<Vec<&str>, &'static str> {
    let mut terms = Vec::new();
    let mut start = 0;
    for (idx, ch) in compact.char_indices() {
        // A sign following an operator belongs to the term ("H*-2").
        if (ch == '+' || ch == '-') && idx > 0 {
            let bytes = compact.as_bytes();
            let prev = bytes[idx - 1];
            // An exponent sign stays inside its number ("1e-5").
            let exponent_sign = (prev == b'e' || prev == b'E')
                && idx >= 2
                && (bytes[idx - 2].is_ascii_digit() || bytes[idx - 2] == b'.');
            if prev != b'*' && prev != b'/' && prev != b'+' && prev != b'-' && !exponent_sign {
                terms.push(&compact[start..idx]);
                start = idx;
            }
        }
    }
    terms.push(&compact[start..]);
    if terms.iter().any(|t| t.is_empty() || *t == "+" || *t == "-") {
        return Err("dangling operator");
    }
    Ok(terms)
}

/// Parses a single signed term into `(scale, offset)` contributions.
fn parse_term(term: &str) -> std::result::Result<(f64, f64), &'static str> {
    let (sign, body) = match term.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, term.strip_prefix('+').unwrap_or(term)),
    };
    if body.is_empty() {
        return Err("dangling operator");
    }

    // Forms: H, H*k, k*H, H/k, k (constant).
    if body == "H" {
        return Ok((sign, 0.0));
    }
    if let Some(factor) = body.strip_prefix("H*") {
        let k: f64 = factor.parse().map_err(|_| "bad multiplier")?;
        return Ok((sign * k, 0.0));
    }
    if let Some(factor) = body.strip_suffix("*H") {
        let k: f64 = factor.parse().map_err(|_| "bad multiplier")?;
        return Ok((sign * k, 0.0));
    }
    if let Some(divisor) = body.strip_prefix("H/") {
        let k: f64 = divisor.parse().map_err(|_| "bad divisor")?;
        if k == 0.0 {
            return Err("division by zero");
        }
        return Ok((sign / k, 0.0));
    }
    if body.contains('H') {
        return Err("only linear terms in H are supported");
    }
    let constant: f64 = body.parse().map_err(|_| "bad constant")?;
    Ok((0.0, sign * constant))
}
