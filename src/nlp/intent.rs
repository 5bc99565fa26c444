//! Rule-based intent classification
//!
//! The classifier is an ordered table of `(pattern, intent, slot extractor)`
//! rules evaluated against the normalized utterance. The first rule whose
//! pattern matches *and* whose extractor accepts the captures wins; when no
//! rule fires the utterance is `Unknown`.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use super::sentiment::{self, Sentiment};
use super::text::normalize;
use crate::catalog::PriceFilter;

/// What the user wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Search,
    SearchByAuthor,
    SearchByCategory,
    PriceFilter,
    PriceLookup,
    StockLookup,
    InfoLookup,
    OrderStart,
    Recommend,
    ListCategories,
    /// Assigned by the assistant when an open order captures the utterance
    OrderStepReply,
    /// Assigned by the assistant for an explicit cancel utterance
    Cancel,
    Greeting,
    Goodbye,
    Help,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Search => "search",
            Intent::SearchByAuthor => "search_by_author",
            Intent::SearchByCategory => "search_by_category",
            Intent::PriceFilter => "price_filter",
            Intent::PriceLookup => "price_lookup",
            Intent::StockLookup => "stock_lookup",
            Intent::InfoLookup => "info_lookup",
            Intent::OrderStart => "order_start",
            Intent::Recommend => "recommend",
            Intent::ListCategories => "list_categories",
            Intent::OrderStepReply => "order_step_reply",
            Intent::Cancel => "cancel",
            Intent::Greeting => "greeting",
            Intent::Goodbye => "goodbye",
            Intent::Help => "help",
            Intent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values pulled out of the utterance. All text slots are normalized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slots {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<PriceFilter>,
}

/// Result of classifying one utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub slots: Slots,
    pub sentiment: Sentiment,
    pub normalized: String,
}

type SlotExtractor = fn(&str, &Captures) -> Option<Slots>;

struct Rule {
    intent: Intent,
    pattern: Regex,
    extract: SlotExtractor,
}

/// Words dropped from the front of a captured fragment
const LEADING_FILLER: &[&str] = &["sach", "cuon", "quyen", "cua", "ve", "cai", "hang"];

/// Words dropped from the end of a captured fragment
const TRAILING_FILLER: &[&str] = &[
    "khong", "ko", "k", "vay", "nhe", "a", "nhi", "the", "di", "voi", "duoc", "oi",
    "ban", "shop", "nao", "gi", "nay", "do", "cuon", "quyen", "giup", "minh", "toi",
];

fn clean_fragment(raw: &str) -> Option<String> {
    let mut words: Vec<&str> = raw.split_whitespace().collect();
    while words.first().is_some_and(|w| LEADING_FILLER.contains(w)) {
        words.remove(0);
    }
    while words.last().is_some_and(|w| TRAILING_FILLER.contains(w)) {
        words.pop();
    }
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn group(caps: &Captures, name: &str) -> Option<String> {
    caps.name(name).and_then(|m| clean_fragment(m.as_str()))
}

// ========== Slot extractors ==========

fn no_slots(_: &str, _: &Captures) -> Option<Slots> {
    Some(Slots::default())
}

fn book_slot(_: &str, caps: &Captures) -> Option<Slots> {
    group(caps, "book").map(|book| Slots {
        book: Some(book),
        ..Slots::default()
    })
}

fn optional_book_slot(_: &str, caps: &Captures) -> Option<Slots> {
    Some(Slots {
        book: group(caps, "book"),
        ..Slots::default()
    })
}

/// A price window in the object means "mua sách gì dưới 100k" style
/// shopping questions, not an order.
fn order_slot(text: &str, caps: &Captures) -> Option<Slots> {
    if caps
        .name("book")
        .is_some_and(|m| parse_price(m.as_str()).is_some())
    {
        return None;
    }
    optional_book_slot(text, caps)
}

fn author_slot(_: &str, caps: &Captures) -> Option<Slots> {
    group(caps, "author").map(|author| Slots {
        author: Some(author),
        ..Slots::default()
    })
}

fn category_slot(_: &str, caps: &Captures) -> Option<Slots> {
    group(caps, "category").map(|category| Slots {
        category: Some(category),
        ..Slots::default()
    })
}

fn query_slot(_: &str, caps: &Captures) -> Option<Slots> {
    group(caps, "query").map(|query| Slots {
        query: Some(query),
        ..Slots::default()
    })
}

fn price_slot(text: &str, _: &Captures) -> Option<Slots> {
    parse_price(text).map(|price| Slots {
        price: Some(price),
        ..Slots::default()
    })
}

fn price_patterns() -> &'static [(PriceKind, Regex); 4] {
    static PATTERNS: OnceLock<[(PriceKind, Regex); 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("price pattern must compile");
        [
            (PriceKind::Range, re(r"\btu\s*(\d+)\s*(?:d\s+)?(?:den|toi)\s*(\d+)")),
            (PriceKind::Below, re(r"\b(?:duoi|thap hon|nho hon|khong qua|toi da)\s*(\d+)")),
            (PriceKind::Above, re(r"\b(?:tren|cao hon|lon hon)\s*(\d+)")),
            (PriceKind::AtLeast, re(r"\b(?:tu|toi thieu)\s*(\d+)")),
        ]
    })
}

#[derive(Debug, Clone, Copy)]
enum PriceKind {
    Range,
    Below,
    Above,
    AtLeast,
}

/// Extract a price window from normalized text.
pub fn parse_price(text: &str) -> Option<PriceFilter> {
    let num = |caps: &Captures, i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i64>().ok());

    for (kind, pattern) in price_patterns() {
        if let Some(caps) = pattern.captures(text) {
            let first = num(&caps, 1)?;
            return Some(match kind {
                PriceKind::Range => PriceFilter::between(first, num(&caps, 2)?),
                PriceKind::Below => PriceFilter::below(first),
                PriceKind::Above => PriceFilter::above(first),
                PriceKind::AtLeast => PriceFilter::at_least(first),
            });
        }
    }
    None
}

fn recommend_slots(text: &str, caps: &Captures) -> Option<Slots> {
    price_slot(text, caps)
}

/// The ordered rule table; earlier rules win.
fn build_rules() -> Vec<Rule> {
    let table: Vec<(Intent, &str, SlotExtractor)> = vec![
        // List categories
        (
            Intent::ListCategories,
            r"\b(?:the loai|loai sach)\b.*\b(?:gi|nao)\b",
            no_slots,
        ),
        (
            Intent::ListCategories,
            r"\b(?:danh sach|co nhung|liet ke|cac)\s+(?:the loai|loai sach)\b",
            no_slots,
        ),
        // Start an order
        (
            Intent::OrderStart,
            r"^(?:cho\s+(?:toi|minh|em)\s+)?(?:(?:toi|minh|em|anh|chi)\s+)?(?:muon\s+|can\s+|se\s+)?(?:dat mua|dat hang|dat sach|dat|mua|order)\s+(?P<book>.+)$",
            order_slot,
        ),
        (
            Intent::OrderStart,
            r"^(?:(?:toi|minh|em)\s+)?(?:muon\s+)?(?:dat mua|dat hang|mua sach|order)$",
            no_slots,
        ),
        // Recommendation inside a price window
        (
            Intent::Recommend,
            r"\b(?:goi y|de xuat|hay|tot|dang doc|nen doc|ban chay)\b.*\b(?:duoi|tren|tu|thap hon|cao hon|nho hon|lon hon)\s*\d+",
            recommend_slots,
        ),
        (
            Intent::Recommend,
            r"\b(?:duoi|tren|tu|thap hon|cao hon|nho hon|lon hon)\s*\d+\b.*\b(?:hay|tot|nen doc|ban chay)\b",
            recommend_slots,
        ),
        // Price window search
        (
            Intent::PriceFilter,
            r"\b(?:duoi|tren|tu|thap hon|cao hon|nho hon|lon hon|khong qua|toi da)\s*\d+",
            price_slot,
        ),
        // Stock
        (
            Intent::StockLookup,
            r"^(?:kiem tra\s+)?(?:ton kho|con hang|so luong)\s+(?P<book>.+)$",
            book_slot,
        ),
        (
            Intent::StockLookup,
            r"^(?P<book>.+?)\s+(?:con hang|con bao nhieu|con may|con khong|con ko|ton kho|het hang)\b",
            book_slot,
        ),
        // Price of one book
        (
            Intent::PriceLookup,
            r"^(?:gia|gia tien|gia ban)\s+(?P<book>.+?)(?:\s+(?:la\s+)?bao nhieu(?:\s+tien)?)?$",
            book_slot,
        ),
        (
            Intent::PriceLookup,
            r"^bao nhieu tien\s+(?P<book>.+)$",
            book_slot,
        ),
        (
            Intent::PriceLookup,
            r"^(?P<book>.+?)\s+(?:gia bao nhieu|gia la bao nhieu|bao nhieu tien|gia the nao|gia)$",
            book_slot,
        ),
        // Book details
        (
            Intent::InfoLookup,
            r"\b(?:thong tin|tra cuu|chi tiet)\s+(?:ve\s+|cua\s+)?(?P<book>.+)$",
            book_slot,
        ),
        // Recommendation
        (
            Intent::Recommend,
            r"\b(?:goi y|de xuat|hay nhat|ban chay|nen doc|dang doc|sach hay|cuon hay|sach tot)\b",
            no_slots,
        ),
        // Author / category
        (
            Intent::SearchByAuthor,
            r"\b(?:tac gia|sach cua|viet boi|tac pham cua)\s+(?:tac gia\s+)?(?P<author>.+)$",
            author_slot,
        ),
        (
            Intent::SearchByCategory,
            r"\b(?:sach ve|the loai|thuoc loai|chu de)\s+(?P<category>.+)$",
            category_slot,
        ),
        // Free search
        (
            Intent::Search,
            r"\b(?:tim kiem|tim|search|co sach|co cuon|kiem)\s+(?P<query>.+)$",
            query_slot,
        ),
        (
            Intent::Search,
            r"^(?:sach|cuon|quyen)\s+(?P<query>.+)$",
            query_slot,
        ),
        // Small talk
        (
            Intent::Help,
            r"\b(?:giup|help|huong dan|lam sao de|lam the nao)\b",
            no_slots,
        ),
        (
            Intent::Goodbye,
            r"\b(?:tam biet|bye|goodbye|hen gap lai)\b",
            no_slots,
        ),
        (
            Intent::Greeting,
            r"^(?:xin chao|chao|hello|hi|alo)\b",
            no_slots,
        ),
    ];

    table
        .into_iter()
        .map(|(intent, pattern, extract)| Rule {
            intent,
            pattern: Regex::new(pattern).expect("intent rule pattern must compile"),
            extract,
        })
        .collect()
}

/// Ordered-rule intent classifier
pub struct IntentClassifier {
    rules: Vec<Rule>,
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self {
            rules: build_rules(),
        }
    }

    /// Number of rules in the table
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classify a raw utterance
    pub fn classify(&self, text: &str) -> Classification {
        let normalized = normalize(text);
        let sentiment = sentiment::analyze(&normalized);

        for rule in &self.rules {
            if let Some(caps) = rule.pattern.captures(&normalized) {
                if let Some(slots) = (rule.extract)(&normalized, &caps) {
                    tracing::debug!(intent = %rule.intent, ?slots, "utterance classified");
                    return Classification {
                        intent: rule.intent,
                        slots,
                        sentiment,
                        normalized,
                    };
                }
            }
        }

        tracing::debug!(text = %normalized, "no intent rule matched");
        Classification {
            intent: Intent::Unknown,
            slots: Slots::default(),
            sentiment,
            normalized,
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}
