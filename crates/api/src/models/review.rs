//! Review and cart domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use pharma_link_core::{AccountId, CartId, ReviewId};

/// A review one account wrote about another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub id: ReviewId,
    /// Account that wrote the review.
    pub author_id: AccountId,
    /// Account the review is about.
    pub subject_id: AccountId,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A pharmacy's shopping cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    pub id: CartId,
    pub owner_id: AccountId,
    pub total_price: Decimal,
}
