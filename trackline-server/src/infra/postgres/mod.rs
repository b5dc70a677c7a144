//! sqlx adapters for the collaborator ports. Queries are runtime-checked;
//! the schema belongs to the package and account services.

pub mod identities;
pub mod packages;

use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};
use trackline_core::StoreError;

pub use identities::PostgresIdentityStore;
pub use packages::PostgresPackageStore;

pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub(crate) fn db_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => {
            StoreError::NotFound("row not found".to_string())
        }
        other => StoreError::Database(other.to_string()),
    }
}

pub(crate) fn column_error(column: &str, err: sqlx::Error) -> StoreError {
    StoreError::Database(format!("Failed to read {column}: {err}"))
}
