//! Keyword-based sentiment tagging
//!
//! Only used to soften the fallback reply when the assistant could not
//! understand the user.

use serde::{Deserialize, Serialize};

use super::text::contains_phrase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Frustrated,
    Excited,
}

const POSITIVE: &[&str] = &[
    "tot", "hay", "tuyet", "xuat sac", "thich", "hai long", "thu vi", "hap dan",
    "cam on", "thanks", "thank you", "tuyet voi", "hoan hao", "dang gia",
];

const NEGATIVE: &[&str] = &[
    "te", "xau", "khong thich", "ghet", "chan", "that vong", "buc minh",
    "kho chiu", "khong hai long", "dat qua", "lua dao", "kem", "loi", "sai",
];

const FRUSTRATED: &[&str] = &[
    "tai sao", "sao lai", "khong hieu", "kho hieu", "phuc tap", "roi rac",
    "khong biet", "lam sao", "nhu the nao", "khong tim thay",
];

const EXCITED: &[&str] = &[
    "wow", "tuyet qua", "amazing", "qua hay", "qua tot", "thich qua",
    "dat ngay", "mua ngay", "can ngay", "gap",
];

fn count(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| contains_phrase(text, k)).count()
}

/// Tag a normalized utterance.
pub fn analyze(normalized: &str) -> Sentiment {
    let positive = count(normalized, POSITIVE);
    let negative = count(normalized, NEGATIVE);
    let frustrated = count(normalized, FRUSTRATED);
    let excited = count(normalized, EXCITED);

    if excited > 0 && excited >= positive {
        Sentiment::Excited
    } else if frustrated > 0 && frustrated >= negative {
        Sentiment::Frustrated
    } else if positive > negative {
        Sentiment::Positive
    } else if negative > positive {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::text::normalize;

    #[test]
    fn test_sentiment() {
        assert_eq!(analyze(&normalize("Sao lại không hiểu vậy")), Sentiment::Frustrated);
        assert_eq!(analyze(&normalize("Wow, mua ngay!")), Sentiment::Excited);
        assert_eq!(analyze(&normalize("Cảm ơn, tuyệt vời")), Sentiment::Positive);
        assert_eq!(analyze(&normalize("Dịch vụ tệ, thất vọng")), Sentiment::Negative);
        assert_eq!(analyze(&normalize("abc xyz")), Sentiment::Neutral);
    }
}
