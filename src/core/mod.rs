//! Core assistant engine
//!
//! This module contains the turn-handling logic that ties the classifier,
//! the order dialogue, the sessions and the store together.

mod assistant;
pub mod format;

pub use assistant::{Assistant, AssistantError, Reply, Statistics};
