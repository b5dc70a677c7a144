use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{error::StoreError, types::ConnectionRole};

/// What the authenticator needs to know about a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub user_id: String,
    pub role: ConnectionRole,
    /// Last password/credential change. Tokens issued before it are void.
    pub credential_changed_at: Option<DateTime<Utc>>,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn fetch_identity(
        &self,
        user_id: &str,
    ) -> Result<Option<IdentityRecord>, StoreError>;
}
