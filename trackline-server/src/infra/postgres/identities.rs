use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use trackline_core::{ConnectionRole, IdentityRecord, IdentityStore, StoreError};

use super::{column_error, db_error};

/// Reads identities from the `users` table owned by the account service.
#[derive(Debug, Clone)]
pub struct PostgresIdentityStore {
    pool: PgPool,
}

impl PostgresIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<IdentityRecord, StoreError> {
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| column_error("user_id", e))?;
        let user_role: Option<String> = row
            .try_get("user_role")
            .map_err(|e| column_error("user_role", e))?;
        // Stored as epoch milliseconds.
        let password_changed_at: Option<i64> = row
            .try_get("password_changed_at")
            .map_err(|e| column_error("password_changed_at", e))?;

        Ok(IdentityRecord {
            user_id,
            role: user_role
                .as_deref()
                .map(ConnectionRole::from_user_role)
                .unwrap_or(ConnectionRole::Other),
            credential_changed_at: password_changed_at
                .and_then(millis_to_datetime),
        })
    }
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    async fn fetch_identity(
        &self,
        user_id: &str,
    ) -> Result<Option<IdentityRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                user_id,
                user_role::text AS user_role,
                password_changed_at::bigint AS password_changed_at
            FROM users
            WHERE user_id = $1
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(Self::map_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millisecond_timestamps_convert() {
        let at = millis_to_datetime(1_700_000_000_500).unwrap();
        assert_eq!(at.timestamp(), 1_700_000_000);
        assert_eq!(at.timestamp_subsec_millis(), 500);
    }
}
