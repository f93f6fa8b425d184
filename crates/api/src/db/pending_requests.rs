//! Pending pharmacy request repository.

use async_trait::async_trait;
use secrecy::SecretString;
use sqlx::PgPool;

use pharma_link_core::PendingRequestId;

use super::RepositoryError;
use crate::models::PendingRequest;
use crate::services::accounts::PendingRequestStore;

#[derive(sqlx::FromRow)]
struct PendingRequestRow {
    id: i32,
    username: String,
    email: String,
    phone: Option<String>,
    password: Option<String>,
    license_number: Option<String>,
    pharmacy_name: String,
    street: Option<String>,
    city: Option<String>,
    state: Option<String>,
    contact_name: Option<String>,
}

impl From<PendingRequestRow> for PendingRequest {
    fn from(row: PendingRequestRow) -> Self {
        Self {
            id: PendingRequestId::new(row.id),
            username: row.username,
            email: row.email,
            phone: row.phone,
            password: row.password.map(SecretString::from),
            license_number: row.license_number,
            pharmacy_name: row.pharmacy_name,
            street: row.street,
            city: row.city,
            state: row.state,
            contact_name: row.contact_name,
        }
    }
}

/// Repository for pending pharmacy requests.
pub struct PendingRequestRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PendingRequestRepository<'a> {
    /// Create a new pending request repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PendingRequestStore for PendingRequestRepository<'_> {
    async fn get_by_id(
        &self,
        id: PendingRequestId,
    ) -> Result<Option<PendingRequest>, RepositoryError> {
        let row = sqlx::query_as::<_, PendingRequestRow>(
            r"
            SELECT id, username, email, phone, password, license_number,
                   pharmacy_name, street, city, state, contact_name
            FROM pharma.pending_request
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn delete(&self, id: PendingRequestId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM pharma.pending_request WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
