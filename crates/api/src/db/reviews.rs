//! Review repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use pharma_link_core::{AccountId, ReviewId};

use super::RepositoryError;
use crate::models::Review;
use crate::services::accounts::ReviewStore;

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i32,
    author_id: i32,
    subject_id: i32,
    rating: i16,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: ReviewId::new(row.id),
            author_id: AccountId::new(row.author_id),
            subject_id: AccountId::new(row.subject_id),
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

/// Repository for reviews between accounts.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewStore for ReviewRepository<'_> {
    async fn find_by_subject(&self, account: AccountId) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r"
            SELECT id, author_id, subject_id, rating, comment, created_at
            FROM pharma.review
            WHERE subject_id = $1
            ORDER BY id
            ",
        )
        .bind(account.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_by_author(&self, account: AccountId) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r"
            SELECT id, author_id, subject_id, rating, comment, created_at
            FROM pharma.review
            WHERE author_id = $1
            ORDER BY id
            ",
        )
        .bind(account.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, id: ReviewId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM pharma.review WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
