//! Catalog and order persistence
//!
//! [`BookStore`] is the seam between the assistant and its data. Read-side
//! queries have default implementations over [`BookStore::all_books`] so a
//! backend only has to supply the primitive operations.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::{query, Book, NewOrder, Order, OrderStatus, PriceFilter};
use crate::nlp::BookMatcher;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Book not found: {0}")]
    BookNotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Insufficient stock: only {available} left")]
    InsufficientStock { available: i64 },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Aggregate numbers for the stats endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub books: i64,
    pub categories: i64,
    pub authors: i64,
    pub total_stock: i64,
    pub orders: i64,
    pub confirmed_orders: i64,
    /// Sum of `total_price` over confirmed orders, in VND
    pub revenue: i64,
}

#[async_trait]
pub trait BookStore: Send + Sync {
    // ========== Catalog ==========

    /// Every book, ordered by title.
    async fn all_books(&self) -> StoreResult<Vec<Book>>;

    async fn get_book(&self, id: &str) -> StoreResult<Book>;

    /// Insert or replace books by id. Returns how many were written.
    async fn insert_books(&self, books: &[Book]) -> StoreResult<usize>;

    /// Set the stock of one book.
    async fn update_stock(&self, book_id: &str, stock: i64) -> StoreResult<()>;

    async fn search(&self, text: &str) -> StoreResult<Vec<Book>> {
        Ok(query::search(&self.all_books().await?, text))
    }

    async fn filter_by_price(&self, filter: &PriceFilter) -> StoreResult<Vec<Book>> {
        Ok(query::filter_by_price(&self.all_books().await?, filter))
    }

    /// Resolve a book-name fragment; `BookNotFound` when nothing is close.
    async fn get_by_name(&self, fragment: &str, matcher: &BookMatcher) -> StoreResult<Book> {
        let books = self.all_books().await?;
        matcher
            .resolve(fragment, &books)
            .cloned()
            .ok_or_else(|| StoreError::BookNotFound(fragment.to_string()))
    }

    async fn recommend(
        &self,
        filter: Option<&PriceFilter>,
        limit: usize,
    ) -> StoreResult<Vec<Book>> {
        Ok(query::recommend(&self.all_books().await?, filter, limit))
    }

    async fn list_categories(&self) -> StoreResult<Vec<String>> {
        Ok(query::categories(&self.all_books().await?))
    }

    async fn books_by_author(&self, fragment: &str) -> StoreResult<Vec<Book>> {
        Ok(query::by_author(&self.all_books().await?, fragment))
    }

    async fn books_by_category(&self, fragment: &str) -> StoreResult<Vec<Book>> {
        Ok(query::by_category(&self.all_books().await?, fragment))
    }

    // ========== Orders ==========

    /// Persist an order and take its quantity out of stock. Either both
    /// happen or neither does; a short stock yields `InsufficientStock`.
    async fn create_order(&self, order: NewOrder) -> StoreResult<Order>;

    async fn get_order(&self, id: &str) -> StoreResult<Order>;

    async fn update_order_status(&self, id: &str, status: OrderStatus) -> StoreResult<()>;

    /// Orders placed with this phone number, newest first.
    async fn orders_by_phone(&self, phone: &str) -> StoreResult<Vec<Order>>;

    async fn statistics(&self) -> StoreResult<StoreStats>;
}
