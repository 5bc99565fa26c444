//! Language handling for Vietnamese utterances
//!
//! Folding, intent rules, book-name resolution and a small sentiment tagger.

pub mod intent;
pub mod matcher;
pub mod sentiment;
pub mod text;

pub use intent::{Classification, Intent, IntentClassifier, Slots};
pub use matcher::BookMatcher;
pub use sentiment::Sentiment;
