// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human date format patterns
//!
//! Date options carry display-style patterns (`D MMM YYYY`, `YYYY-MM-DD
//! HH:mm:ss`) rather than strftime. The tokens are translated to a chrono
//! format string; anything that is not a recognised token passes through
//! literally.

use chrono::{DateTime, FixedOffset};

/// Recognised tokens, longest first so that `YYYY` wins over `YY`
const TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("YY", "%y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("MM", "%m"),
    ("M", "%-m"),
    ("dddd", "%A"),
    ("ddd", "%a"),
    ("DD", "%d"),
    ("D", "%-d"),
    ("HH", "%H"),
    ("H", "%-H"),
    ("hh", "%I"),
    ("h", "%-I"),
    ("mm", "%M"),
    ("m", "%-M"),
    ("ss", "%S"),
    ("s", "%-S"),
    ("A", "%p"),
    ("a", "%P"),
    ("ZZ", "%z"),
    ("Z", "%:z"),
    ("X", "%s"),
];

/// Format a date using a human format pattern
pub fn format_date(dt: &DateTime<FixedOffset>, pattern: &str) -> String {
    dt.format(&translate_pattern(pattern)).to_string()
}

/// Translate a human pattern into a chrono format string
fn translate_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut rest = pattern;

    'outer: while !rest.is_empty() {
        for (token, replacement) in TOKENS {
            if let Some(remainder) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = remainder;
                continue 'outer;
            }
        }

        let mut chars = rest.chars();
        let c = match chars.next() {
            Some(c) => c,
            None => break,
        };
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
        rest = chars.as_str();
    }

    out
}
