//! SQLite-backed book and order store
//!
//! Books and orders live in two tables. Placing an order runs the guarded
//! stock decrement and the order insert in one transaction, so concurrent
//! confirmations can never push stock below zero.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use super::{BookStore, StoreError, StoreResult, StoreStats};
use crate::catalog::{Book, NewOrder, Order, OrderStatus};

/// Raw `orders` row as read by `query_as`
type OrderRow = (
    String,
    String,
    i64,
    String,
    Option<String>,
    i64,
    i64,
    String,
    String,
    String,
);

const ORDER_COLUMNS: &str = "id, book_id, quantity, address, phone, unit_price, total_price, status, created_at, updated_at";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at the given path
    pub async fn new(db_path: &Path) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::InvalidData(format!(
                        "cannot create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create an in-memory store (tests, demos)
    pub async fn new_in_memory_async() -> StoreResult<Self> {
        // A single connection that never recycles, or the database vanishes.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                author TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT '',
                price INTEGER NOT NULL CHECK (price >= 0),
                stock INTEGER NOT NULL CHECK (stock >= 0),
                rating REAL CHECK (rating IS NULL OR (rating >= 0 AND rating <= 5))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                book_id TEXT NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity > 0),
                address TEXT NOT NULL,
                phone TEXT,
                unit_price INTEGER NOT NULL,
                total_price INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (book_id) REFERENCES books(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_orders_phone
            ON orders(phone, created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_books_category
            ON books(category)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn current_stock(&self, book_id: &str) -> StoreResult<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT stock FROM books WHERE id = ?")
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(stock,)| stock))
    }
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("bad timestamp {:?}: {}", raw, e)))
}

fn order_from_row(row: OrderRow) -> StoreResult<Order> {
    let (id, book_id, quantity, address, phone, unit_price, total_price, status, created, updated) =
        row;
    Ok(Order {
        status: status.parse().map_err(StoreError::InvalidData)?,
        created_at: parse_timestamp(&created)?,
        updated_at: parse_timestamp(&updated)?,
        id,
        book_id,
        quantity,
        address,
        phone,
        unit_price,
        total_price,
    })
}

fn new_order_id() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("ORD-{}", raw[..12].to_uppercase())
}

#[async_trait]
impl BookStore for SqliteStore {
    async fn all_books(&self) -> StoreResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, title, author, category, price, stock, rating
            FROM books
            ORDER BY title COLLATE NOCASE, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn get_book(&self, id: &str) -> StoreResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            SELECT id, title, author, category, price, stock, rating
            FROM books
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::BookNotFound(id.to_string()))
    }

    async fn insert_books(&self, books: &[Book]) -> StoreResult<usize> {
        if let Some(bad) = books.iter().find(|b| !b.is_valid()) {
            return Err(StoreError::InvalidData(format!(
                "book {} has negative price or stock, or a rating outside 0..=5",
                bad.id
            )));
        }

        let mut tx = self.pool.begin().await?;
        for book in books {
            sqlx::query(
                r#"
                INSERT INTO books (id, title, author, category, price, stock, rating)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    author = excluded.author,
                    category = excluded.category,
                    price = excluded.price,
                    stock = excluded.stock,
                    rating = excluded.rating
                "#,
            )
            .bind(&book.id)
            .bind(&book.title)
            .bind(&book.author)
            .bind(&book.category)
            .bind(book.price)
            .bind(book.stock)
            .bind(book.rating)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(count = books.len(), "books upserted");
        Ok(books.len())
    }

    async fn update_stock(&self, book_id: &str, stock: i64) -> StoreResult<()> {
        if stock < 0 {
            return Err(StoreError::InvalidData(format!(
                "stock cannot be negative ({})",
                stock
            )));
        }

        let result = sqlx::query("UPDATE books SET stock = ? WHERE id = ?")
            .bind(stock)
            .bind(book_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::BookNotFound(book_id.to_string()));
        }
        Ok(())
    }

    async fn create_order(&self, order: NewOrder) -> StoreResult<Order> {
        if order.quantity <= 0 {
            return Err(StoreError::InvalidData(format!(
                "quantity must be positive ({})",
                order.quantity
            )));
        }
        if order.address.trim().is_empty() {
            return Err(StoreError::InvalidData("address is empty".into()));
        }

        let mut tx = self.pool.begin().await?;

        let decremented = sqlx::query(
            r#"
            UPDATE books SET stock = stock - ?
            WHERE id = ? AND stock >= ?
            "#,
        )
        .bind(order.quantity)
        .bind(&order.book_id)
        .bind(order.quantity)
        .execute(&mut *tx)
        .await?;

        if decremented.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(match self.current_stock(&order.book_id).await? {
                Some(available) => StoreError::InsufficientStock { available },
                None => StoreError::BookNotFound(order.book_id.clone()),
            });
        }

        let now = Utc::now();
        let placed = Order {
            id: new_order_id(),
            total_price: order.total_price(),
            book_id: order.book_id,
            quantity: order.quantity,
            address: order.address,
            phone: order.phone,
            unit_price: order.unit_price,
            status: order.status,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO orders (id, book_id, quantity, address, phone, unit_price,
                                total_price, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&placed.id)
        .bind(&placed.book_id)
        .bind(placed.quantity)
        .bind(&placed.address)
        .bind(&placed.phone)
        .bind(placed.unit_price)
        .bind(placed.total_price)
        .bind(placed.status.as_str())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %placed.id,
            book_id = %placed.book_id,
            quantity = placed.quantity,
            "order placed"
        );
        Ok(placed)
    }

    async fn get_order(&self, id: &str) -> StoreResult<Order> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(order_from_row)
            .unwrap_or_else(|| Err(StoreError::OrderNotFound(id.to_string())))
    }

    async fn update_order_status(&self, id: &str, status: OrderStatus) -> StoreResult<()> {
        let result = sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn orders_by_phone(&self, phone: &str) -> StoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE phone = ? ORDER BY created_at DESC, id",
            ORDER_COLUMNS
        ))
        .bind(phone)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(order_from_row).collect()
    }

    async fn statistics(&self) -> StoreResult<StoreStats> {
        let (books, categories, authors, total_stock): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(DISTINCT category),
                   COUNT(DISTINCT author),
                   COALESCE(SUM(stock), 0)
            FROM books
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let (orders, confirmed_orders, revenue): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN status = 'confirmed' THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN status = 'confirmed' THEN total_price ELSE 0 END), 0)
            FROM orders
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreStats {
            books,
            categories,
            authors,
            total_stock,
            orders,
            confirmed_orders,
            revenue,
        })
    }
}
