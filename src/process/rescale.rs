use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

use crate::process::utils::{format_number, is_missing, parse_number};

/// Lakhs → crores.
pub const SCALE_DIVISOR: f64 = 100.0;

/// Optional sign, digits, optional fraction.
static EMBEDDED_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?[0-9]*\.?[0-9]+").expect("embedded number pattern is valid"));

/// Result of rescaling one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Rescaled<'a> {
    /// Missing sentinel, left as-is.
    Missing(&'a str),
    /// The whole cell was a number.
    Number(f64),
    /// Text with its first embedded number rescaled, or the original text if it had none.
    Text(Cow<'a, str>),
}

impl Rescaled<'_> {
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Rescaled::Missing(raw) => Cow::Borrowed(raw),
            Rescaled::Number(v) => Cow::Owned(format_number(*v)),
            Rescaled::Text(t) => Cow::Borrowed(t.as_ref()),
        }
    }
}

/// Rescale a raw cell value.
pub fn rescale(raw: &str) -> Rescaled<'_> {
    if is_missing(raw) {
        return Rescaled::Missing(raw);
    }
    match parse_number(raw) {
        Some(v) => Rescaled::Number(v / SCALE_DIVISOR),
        None => Rescaled::Text(rescale_text(raw)),
    }
}

/// Rescale only the first number embedded in `raw`; every other character is kept.
/// Later numbers in the same cell are not touched.
pub fn rescale_text(raw: &str) -> Cow<'_, str> {
    let Some(m) = EMBEDDED_NUMBER.find(raw) else {
        return Cow::Borrowed(raw);
    };
    let Ok(n) = m.as_str().parse::<f64>() else {
        return Cow::Borrowed(raw);
    };
    let mut out = String::with_capacity(raw.len() + 4);
    out.push_str(&raw[..m.start()]);
    out.push_str(&format_number(n / SCALE_DIVISOR));
    out.push_str(&raw[m.end()..]);
    Cow::Owned(out)
}
