//! Catalog and order domain types
//!
//! Plain data shared by the store, the classifier and the dialogue. Query
//! logic over a list of books lives in [`query`].

pub mod query;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Bound;
use std::str::FromStr;

/// A book in the catalog. Prices are whole VND.
pub const MAX_RATING: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub category: String,
    pub price: i64,
    pub stock: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl Book {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        category: impl Into<String>,
        price: i64,
        stock: i64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: author.into(),
            category: category.into(),
            price,
            stock,
            rating: None,
        }
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Price and stock non-negative, rating (if any) a finite value in `0..=5`.
    pub fn is_valid(&self) -> bool {
        self.price >= 0
            && self.stock >= 0
            && self
                .rating
                .map_or(true, |r| r.is_finite() && (0.0..=MAX_RATING).contains(&r))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// A persisted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub book_id: String,
    pub quantity: i64,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub unit_price: i64,
    pub total_price: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to place an order; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub book_id: String,
    pub quantity: i64,
    pub address: String,
    pub phone: Option<String>,
    pub unit_price: i64,
    pub status: OrderStatus,
}

impl NewOrder {
    pub fn total_price(&self) -> i64 {
        self.unit_price.saturating_mul(self.quantity)
    }
}

/// Price window extracted from phrases like "dưới 100000" or
/// "từ 50000 đến 150000".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFilter {
    pub min: Bound<i64>,
    pub max: Bound<i64>,
}

impl PriceFilter {
    /// price < ceiling
    pub fn below(ceiling: i64) -> Self {
        Self {
            min: Bound::Unbounded,
            max: Bound::Excluded(ceiling),
        }
    }

    /// price > floor
    pub fn above(floor: i64) -> Self {
        Self {
            min: Bound::Excluded(floor),
            max: Bound::Unbounded,
        }
    }

    /// price >= floor
    pub fn at_least(floor: i64) -> Self {
        Self {
            min: Bound::Included(floor),
            max: Bound::Unbounded,
        }
    }

    /// low <= price <= high (bounds are swapped if given in reverse)
    pub fn between(low: i64, high: i64) -> Self {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        Self {
            min: Bound::Included(low),
            max: Bound::Included(high),
        }
    }

    pub fn contains(&self, price: i64) -> bool {
        let above_min = match self.min {
            Bound::Included(n) => price >= n,
            Bound::Excluded(n) => price > n,
            Bound::Unbounded => true,
        };
        let below_max = match self.max {
            Bound::Included(n) => price <= n,
            Bound::Excluded(n) => price < n,
            Bound::Unbounded => true,
        };
        above_min && below_max
    }
}
