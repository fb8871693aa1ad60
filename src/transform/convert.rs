//! Value conversions used by the transform steps

use once_cell::sync::Lazy;
use regex::Regex;

/// Parse a number, accepting German notation.
///
/// `1.234,56` and `1234,56` both read as 1234.56; spaces are ignored. A value
/// with only dots is read as a plain decimal.
pub fn parse_number(input: &str) -> Option<f64> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let normalized = if compact.contains(',') && compact.contains('.') {
        compact.replace('.', "").replace(',', ".")
    } else if compact.contains(',') {
        compact.replace(',', ".")
    } else {
        compact
    };

    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse a boolean, accepting German and English spellings
pub fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "1" | "true" | "ja" | "yes" | "y" | "j" | "x" | "wahr" | "aktiv" => Some(true),
        "0" | "false" | "nein" | "no" | "n" | "falsch" | "inaktiv" => Some(false),
        _ => None,
    }
}

/// Net amount for a gross amount at `tax_rate` percent, rounded to cents
pub fn net_from_gross(gross: f64, tax_rate: f64) -> f64 {
    let net = gross / (1.0 + tax_rate / 100.0);
    (net * 100.0).round() / 100.0
}

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static BLOCK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*(?:br|/p|/div|/li|/h[1-6])\s*/?\s*>").expect("valid regex")
});

/// Remove HTML markup, keeping line breaks of block elements
pub fn strip_html(input: &str) -> String {
    let with_breaks = BLOCK_TAG.replace_all(input, "\n");
    let text = HTML_TAG.replace_all(&with_breaks, "");
    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Unit tokens and the canonical unit codes they map to
const UNITS: &[(&str, &str)] = &[
    ("stück", "Stk"),
    ("stueck", "Stk"),
    ("stk", "Stk"),
    ("stck", "Stk"),
    ("st", "Stk"),
    ("pcs", "Stk"),
    ("pc", "Stk"),
    ("piece", "Stk"),
    ("pieces", "Stk"),
    ("kg", "Kg"),
    ("kilogramm", "Kg"),
    ("kilo", "Kg"),
    ("g", "Gramm"),
    ("gramm", "Gramm"),
    ("gram", "Gramm"),
    ("l", "Liter"),
    ("liter", "Liter"),
    ("litre", "Liter"),
    ("ml", "Milliliter"),
    ("milliliter", "Milliliter"),
    ("m", "Meter"),
    ("meter", "Meter"),
    ("cm", "Zentimeter"),
    ("zentimeter", "Zentimeter"),
    ("mm", "Millimeter"),
    ("millimeter", "Millimeter"),
    ("set", "Set"),
    ("paar", "Paar"),
    ("pair", "Paar"),
    ("box", "Box"),
    ("karton", "Karton"),
    ("palette", "Palette"),
];

/// Canonical unit code for a unit token, if recognised
pub fn canonical_unit(token: &str) -> Option<&'static str> {
    let key = token.trim().trim_end_matches('.').to_lowercase();
    UNITS
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, code)| *code)
}
