//! Multi-turn order dialogue
//!
//! `Idle → AwaitingQuantity → AwaitingAddress → AwaitingConfirmation → Idle`
//!
//! Each non-idle state carries exactly the draft collected so far.
//! [`OrderDialogue::transition`] is pure: it consumes the current state and
//! an event and returns the next state plus an [`Outcome`]. Persisting a
//! confirmed order is left to the caller.

use serde::{Deserialize, Serialize};

use crate::catalog::{Book, NewOrder, OrderStatus};
use crate::nlp::text::{contains_phrase, extract_phone, first_integer, normalize};

/// Utterances that abandon an order from any step, compared against the
/// whole normalized utterance.
const CANCEL_PHRASES: &[&str] = &[
    "huy",
    "huy bo",
    "huy don",
    "huy don hang",
    "cancel",
    "thoi",
    "thoi khong mua nua",
    "bo qua",
    "dung lai",
];

/// Folded negatives. English "no" is matched separately on the unfolded
/// text since "nó" folds to the same word.
const NEGATIVE_WORDS: &[&str] = &["khong", "ko", "huy", "cancel", "thoi"];

const AFFIRMATIVE_WORDS: &[&str] = &[
    "co", "yes", "dong y", "ok", "okay", "xac nhan", "chac chan", "dat luon", "uh",
];

fn starts_with_phrase(normalized: &str, phrase: &str) -> bool {
    normalized
        .strip_prefix(phrase)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Explicit cancel utterance?
pub fn is_cancel(text: &str) -> bool {
    let normalized = normalize(text);
    CANCEL_PHRASES.contains(&normalized.as_str())
}

pub fn is_negative(text: &str) -> bool {
    let normalized = normalize(text);
    NEGATIVE_WORDS.iter().any(|w| contains_phrase(&normalized, w)) || words(text).any(|w| w == "no")
}

pub fn is_affirmative(text: &str) -> bool {
    let normalized = normalize(text);
    AFFIRMATIVE_WORDS.iter().any(|w| contains_phrase(&normalized, w))
}

/// Answer to the confirmation prompt: `Some(true)` to place the order,
/// `Some(false)` to drop it, `None` when it is neither.
///
/// The opening word decides ("có, không vấn đề gì" confirms, "không đồng ý"
/// declines). Otherwise any negative wins over any affirmative.
pub fn confirmation_answer(text: &str) -> Option<bool> {
    let normalized = normalize(text);
    let opens_negative = words(text).next().is_some_and(|w| w == "no")
        || NEGATIVE_WORDS.iter().any(|w| starts_with_phrase(&normalized, w));
    if opens_negative {
        return Some(false);
    }
    if AFFIRMATIVE_WORDS.iter().any(|w| starts_with_phrase(&normalized, w)) {
        return Some(true);
    }

    if is_negative(text) {
        Some(false)
    } else if is_affirmative(text) {
        Some(true)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    #[error("no number in reply")]
    NotANumber,

    #[error("quantity must be positive, got {0}")]
    NotPositive(i64),

    #[error("requested {requested} but only {available} in stock")]
    ExceedsStock { requested: i64, available: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,

    #[error("address has no phone number")]
    MissingPhone,
}

/// First integer in the reply, checked against the stock on hand. Numbers
/// too large to represent count as exceeding stock.
pub fn parse_quantity(text: &str, available: i64) -> Result<i64, QuantityError> {
    let n = first_integer(text).ok_or(QuantityError::NotANumber)?;
    if n <= 0 {
        return Err(QuantityError::NotPositive(n));
    }
    if n > available {
        return Err(QuantityError::ExceedsStock {
            requested: n,
            available,
        });
    }
    Ok(n)
}

/// The trimmed reply is the address; a phone number is pulled out if present.
pub fn parse_address(
    text: &str,
    require_phone: bool,
) -> Result<(String, Option<String>), AddressError> {
    let address = text.trim();
    if address.is_empty() {
        return Err(AddressError::Empty);
    }
    let phone = extract_phone(address);
    if require_phone && phone.is_none() {
        return Err(AddressError::MissingPhone);
    }
    Ok((address.to_string(), phone))
}

/// Everything needed to place an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub book: Book,
    pub quantity: i64,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl OrderDraft {
    pub fn total(&self) -> i64 {
        self.book.price.saturating_mul(self.quantity)
    }

    pub fn to_new_order(&self) -> NewOrder {
        NewOrder {
            book_id: self.book.id.clone(),
            quantity: self.quantity,
            address: self.address.clone(),
            phone: self.phone.clone(),
            unit_price: self.book.price,
            status: OrderStatus::Confirmed,
        }
    }
}

/// Where a conversation is in the order flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum DialogueState {
    #[default]
    Idle,
    AwaitingQuantity {
        book: Book,
    },
    AwaitingAddress {
        book: Book,
        quantity: i64,
    },
    AwaitingConfirmation {
        draft: OrderDraft,
    },
}

impl DialogueState {
    pub fn stage(&self) -> Stage {
        match self {
            DialogueState::Idle => Stage::Idle,
            DialogueState::AwaitingQuantity { .. } => Stage::AwaitingQuantity,
            DialogueState::AwaitingAddress { .. } => Stage::AwaitingAddress,
            DialogueState::AwaitingConfirmation { .. } => Stage::AwaitingConfirmation,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, DialogueState::Idle)
    }

    /// The book being ordered, if any.
    pub fn book(&self) -> Option<&Book> {
        match self {
            DialogueState::Idle => None,
            DialogueState::AwaitingQuantity { book }
            | DialogueState::AwaitingAddress { book, .. } => Some(book),
            DialogueState::AwaitingConfirmation { draft } => Some(&draft.book),
        }
    }
}

/// State label without the draft data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    AwaitingQuantity,
    AwaitingAddress,
    AwaitingConfirmation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::AwaitingQuantity => "awaiting_quantity",
            Stage::AwaitingAddress => "awaiting_address",
            Stage::AwaitingConfirmation => "awaiting_confirmation",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event<'a> {
    /// The user asked to buy this (already resolved) book.
    OrderRequested { book: Book },
    /// Any utterance while an order is open. `available` is the stock of the
    /// draft book as re-read from the store for this turn.
    StepReply { text: &'a str, available: i64 },
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Started,
    OutOfStock,
    QuantityAccepted,
    InvalidQuantity(QuantityError),
    AddressAccepted,
    InvalidAddress(AddressError),
    /// The caller must persist this draft.
    Confirmed(OrderDraft),
    Declined,
    /// Confirmation reply was neither yes nor no.
    Reprompt,
    Cancelled,
    NothingToCancel,
    /// Step reply with no open order
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: Stage,
    pub to: DialogueState,
    pub outcome: Outcome,
}

/// Order flow rules
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderDialogue {
    require_phone: bool,
}

impl OrderDialogue {
    pub fn new(require_phone: bool) -> Self {
        Self { require_phone }
    }

    pub fn transition(&self, state: DialogueState, event: Event<'_>) -> Transition {
        let from = state.stage();
        let (to, outcome) = self.step(state, event);
        tracing::debug!(from = from.as_str(), to = to.stage().as_str(), ?outcome, "dialogue transition");
        Transition { from, to, outcome }
    }

    fn step(&self, state: DialogueState, event: Event<'_>) -> (DialogueState, Outcome) {
        use DialogueState::*;

        match (state, event) {
            (Idle, Event::Cancel) => (Idle, Outcome::NothingToCancel),
            (_, Event::Cancel) => (Idle, Outcome::Cancelled),

            // A new order request replaces any draft in progress.
            (_, Event::OrderRequested { book }) => {
                if book.in_stock() {
                    (AwaitingQuantity { book }, Outcome::Started)
                } else {
                    (Idle, Outcome::OutOfStock)
                }
            }

            (Idle, Event::StepReply { .. }) => (Idle, Outcome::Ignored),

            (AwaitingQuantity { mut book }, Event::StepReply { text, available }) => {
                book.stock = available;
                match parse_quantity(text, available) {
                    Ok(quantity) => (AwaitingAddress { book, quantity }, Outcome::QuantityAccepted),
                    Err(e) => (AwaitingQuantity { book }, Outcome::InvalidQuantity(e)),
                }
            }

            (AwaitingAddress { book, quantity }, Event::StepReply { text, .. }) => {
                match parse_address(text, self.require_phone) {
                    Ok((address, phone)) => (
                        AwaitingConfirmation {
                            draft: OrderDraft {
                                book,
                                quantity,
                                address,
                                phone,
                            },
                        },
                        Outcome::AddressAccepted,
                    ),
                    Err(e) => (AwaitingAddress { book, quantity }, Outcome::InvalidAddress(e)),
                }
            }

            (AwaitingConfirmation { draft }, Event::StepReply { text, .. }) => {
                match confirmation_answer(text) {
                    Some(true) => (Idle, Outcome::Confirmed(draft)),
                    Some(false) => (Idle, Outcome::Declined),
                    None => (AwaitingConfirmation { draft }, Outcome::Reprompt),
                }
            }
        }
    }
}
