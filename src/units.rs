// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Memory string parsing, natural ordering and human-readable formatting.

use std::cmp::Ordering;
use std::fmt;

use serde::{Serialize, Serializer};

/// Returned by [`parse_memory`] when the string has no usable `M`/`G` suffix.
pub const UNPARSEABLE_MEMORY: i64 = -1;

/// Parse a Grid Engine memory string (`"512M"`, `"7.8G"`) into whole megabytes.
///
/// Anything without an `M` or `G` suffix, or with a non-numeric prefix,
/// yields [`UNPARSEABLE_MEMORY`]. Callers must check for negative values
/// before doing arithmetic with the result.
pub fn parse_memory(s: &str) -> i64 {
    let s = s.trim();
    let (prefix, factor) = match s.as_bytes().last() {
        Some(b'M') => (&s[..s.len() - 1], 1.0),
        Some(b'G') => (&s[..s.len() - 1], 1024.0),
        _ => return UNPARSEABLE_MEMORY,
    };

    match prefix.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => (value * factor) as i64,
        _ => UNPARSEABLE_MEMORY,
    }
}

/// A run of either ASCII digits or non-digits
#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn tokenize(s: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_digits = None;

    for (i, c) in s.char_indices() {
        let is_digit = c.is_ascii_digit();
        match in_digits {
            Some(prev) if prev != is_digit => {
                tokens.push(make_token(&s[start..i], prev));
                start = i;
            }
            _ => {}
        }
        in_digits = Some(is_digit);
    }
    if let Some(prev) = in_digits {
        tokens.push(make_token(&s[start..], prev));
    }
    tokens
}

fn make_token(s: &str, digits: bool) -> Token<'_> {
    if digits {
        Token::Digits(s)
    } else {
        Token::Text(s)
    }
}

/// Compare two digit runs numerically without overflowing on long runs
fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Natural ordering: embedded numbers compare by value (`img2 < img10`).
///
/// When one token sequence is a prefix of the other, the shorter one sorts
/// first (`img2 < img2a`). Strings that differ only in leading zeros compare
/// equal here; use [`NaturalKey`] for a total order.
pub fn natural_compare(a: &str, b: &str) -> Ordering {
    let left = tokenize(a);
    let right = tokenize(b);

    for (l, r) in left.iter().zip(right.iter()) {
        let cmp = match (l, r) {
            (Token::Digits(x), Token::Digits(y)) => compare_digits(x, y),
            (Token::Digits(x) | Token::Text(x), Token::Digits(y) | Token::Text(y)) => x.cmp(y),
        };
        if cmp != Ordering::Equal {
            return cmp;
        }
    }

    left.len().cmp(&right.len())
}

/// String key ordered naturally, used for host maps.
///
/// Ties under [`natural_compare`] fall back to plain string order so two
/// distinct names never collapse into one map entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey(String);

impl NaturalKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for NaturalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_compare(&self.0, &other.0).then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for NaturalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NaturalKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for NaturalKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Format a value with one truncated decimal, dropping a trailing `.0`
fn one_decimal(tenths: i64) -> String {
    if tenths % 10 == 0 {
        format!("{}", tenths / 10)
    } else {
        format!("{}.{}", tenths / 10, (tenths % 10).abs())
    }
}

/// Format megabytes for humans: `"512M"`, `"1.5G"`.
pub fn human_mem(megs: f64) -> String {
    if megs > 1024.0 {
        format!("{}G", one_decimal((megs * 10.0 / 1024.0) as i64))
    } else {
        format!("{}M", one_decimal((megs * 10.0) as i64))
    }
}

/// Format a duration in seconds as `1d2h3m4s`.
///
/// Leading zero units are omitted; once a unit is printed, every smaller
/// unit down to seconds is printed too.
pub fn human_time(secs: u64) -> String {
    const UNITS: [(u64, char); 3] = [(86_400, 'd'), (3_600, 'h'), (60, 'm')];

    let mut out = String::new();
    let mut rest = secs;
    for (size, suffix) in UNITS {
        let count = rest / size;
        rest %= size;
        if count > 0 || !out.is_empty() {
            out.push_str(&format!("{}{}", count, suffix));
        }
    }
    out.push_str(&format!("{}s", rest));
    out
}
