//! Vietnamese text normalization
//!
//! All matching in the assistant happens on *folded* text: lower-case, no
//! diacritics, no punctuation, single spaces. `Hà Nội` and `ha noi` compare
//! equal, and so do `Giá dưới 100.000đ` and `gia duoi 100000d`.

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

fn thousands_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{1,3}(?:[.,]\d{3})+").expect("valid regex"))
}

fn scaled_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)\s*(k|nghin|ngan|trieu|tr)\b").expect("valid regex")
    })
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\+84|0)\d{9,10}\b").expect("valid regex"))
}

fn integer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+").expect("valid regex"))
}

/// Lower-case and remove Vietnamese diacritics, keeping everything else.
pub fn strip_diacritics(text: &str) -> String {
    text.to_lowercase()
        .replace('đ', "d")
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Fold text for matching: diacritics removed, numbers normalized,
/// punctuation replaced by spaces, whitespace collapsed.
pub fn normalize(text: &str) -> String {
    let folded = strip_diacritics(text);
    let folded = normalize_numbers(&folded);

    let cleaned: String = folded
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `100.000` → `100000`, `150k` → `150000`, `2 trieu` → `2000000`.
fn normalize_numbers(text: &str) -> String {
    let text = thousands_re().replace_all(text, |caps: &regex::Captures| {
        caps[0].replace(['.', ','], "")
    });

    scaled_number_re()
        .replace_all(&text, |caps: &regex::Captures| {
            let factor: i64 = match &caps[2] {
                "trieu" | "tr" => 1_000_000,
                _ => 1_000,
            };
            caps[1]
                .parse::<i64>()
                .ok()
                .and_then(|n| n.checked_mul(factor))
                .map(|n| n.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Whole-word containment on already-normalized strings.
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    format!(" {} ", haystack).contains(&format!(" {} ", needle))
}

/// First integer in a reply, sign included (`"-2 cuốn"` → `-2`).
///
/// Numbers are folded the same way [`normalize`] folds them, so `"1.000"` is
/// `1000`. A digit run too large for `i64` saturates instead of being dropped.
pub fn first_integer(text: &str) -> Option<i64> {
    let folded = normalize_numbers(&strip_diacritics(text));
    let m = integer_re().find(&folded)?;
    let digits = m.as_str();
    Some(digits.parse::<i64>().unwrap_or(if digits.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    }))
}

/// Vietnamese phone number (`0987654321`, `+84987654321`) if present.
pub fn extract_phone(text: &str) -> Option<String> {
    phone_re().find(text).map(|m| m.as_str().to_string())
}
