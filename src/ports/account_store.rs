use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Account, Points};

/// Key-value storage for the current balance of each account
#[mockall::automock]
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Most recently committed record for the account, if any
    async fn read(&self, account_id: Uuid) -> Result<Option<AccountRecord>, Error>;
    /// Upsert the balance for the account
    ///
    /// The returned record carries the `updated_at` that was requested.
    async fn write(
        &self,
        account_id: Uuid,
        balance: Points,
        updated_at: DateTime<Utc>,
    ) -> Result<AccountRecord, Error>;
}

/// Persisted balance for an account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountRecord {
    pub account_id: Uuid,
    pub balance: Points,
    pub updated_at: DateTime<Utc>,
}

impl From<AccountRecord> for Account {
    fn from(record: AccountRecord) -> Self {
        Account::new(record.account_id, record.balance, Some(record.updated_at))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
