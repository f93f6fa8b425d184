//! Cart repository.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use pharma_link_core::{AccountId, CartId};

use super::{RepositoryError, conflict_or_database};
use crate::models::Cart;
use crate::services::accounts::CartStore;

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: i32,
    owner_id: i32,
    total_price: Decimal,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: CartId::new(row.id),
            owner_id: AccountId::new(row.owner_id),
            total_price: row.total_price,
        }
    }
}

/// Repository for pharmacy carts.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartStore for CartRepository<'_> {
    async fn create(&self, owner: AccountId, total_price: Decimal) -> Result<Cart, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            INSERT INTO pharma.cart (owner_id, total_price)
            VALUES ($1, $2)
            RETURNING id, owner_id, total_price
            ",
        )
        .bind(owner.as_i32())
        .bind(total_price)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "account already has a cart"))?;

        Ok(row.into())
    }
}
