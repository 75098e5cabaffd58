use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Points, Transaction, TransactionKind};

/// Append-only storage for committed mutations
#[mockall::automock]
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// Record a mutation and assign it the next transaction id
    async fn append(
        &self,
        account_id: Uuid,
        amount: Points,
        kind: TransactionKind,
        timestamp: DateTime<Utc>,
    ) -> Result<Transaction, Error>;
    /// All transactions of an account, in insertion order
    async fn list_by_account(&self, account_id: Uuid) -> Result<Vec<Transaction>, Error>;
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
