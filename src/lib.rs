//! Bookstore Assistant - Vietnamese chat assistant for a book shop
//!
//! Customers type requests in Vietnamese to search the catalog, ask for
//! prices and stock, get recommendations and place orders through a short
//! multi-step dialogue. The assistant is rule-based: an ordered intent table,
//! a fuzzy book-name matcher and an explicit order state machine over a
//! SQLite store.

use std::sync::Arc;

pub mod catalog;
pub mod config;
pub mod conversation;
pub mod core;
pub mod dialogue;
pub mod nlp;
pub mod routes;
pub mod session;
pub mod store;

pub use crate::core::{Assistant, AssistantError, Reply};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
}
