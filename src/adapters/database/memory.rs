use crate::{
    domain::{Points, Transaction, TransactionKind},
    ports::{
        account_store::{self, AccountRecord, AccountStore},
        history_store::{self, HistoryStore},
    },
};
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use uuid::Uuid;

/// In-memory balance table
#[derive(Clone, Debug, Default)]
pub struct MemoryAccountStore {
    accounts: Arc<Mutex<HashMap<Uuid, AccountRecord>>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AccountStore for MemoryAccountStore {
    async fn read(&self, account_id: Uuid) -> Result<Option<AccountRecord>, account_store::Error> {
        let record = self.accounts.lock()?.get(&account_id).cloned();

        Ok(record)
    }

    async fn write(
        &self,
        account_id: Uuid,
        balance: Points,
        updated_at: DateTime<Utc>,
    ) -> Result<AccountRecord, account_store::Error> {
        let record = AccountRecord {
            account_id,
            balance,
            updated_at,
        };
        self.accounts.lock()?.insert(account_id, record.clone());

        Ok(record)
    }
}

/// In-memory history table
///
/// Transaction ids start at 1 and are shared across all accounts.
#[derive(Clone, Debug, Default)]
pub struct MemoryHistoryStore {
    inner: Arc<Mutex<HistoryTable>>,
}

#[derive(Debug, Default)]
struct HistoryTable {
    last_id: u64,
    by_account: HashMap<Uuid, Vec<Transaction>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(
        &self,
        account_id: Uuid,
        amount: Points,
        kind: TransactionKind,
        timestamp: DateTime<Utc>,
    ) -> Result<Transaction, history_store::Error> {
        let mut table = self.inner.lock()?;
        table.last_id += 1;
        let transaction = Transaction {
            transaction_id: table.last_id,
            account_id,
            amount,
            kind,
            timestamp,
        };
        table
            .by_account
            .entry(account_id)
            .or_default()
            .push(transaction.clone());

        Ok(transaction)
    }

    async fn list_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Transaction>, history_store::Error> {
        let transactions = self
            .inner
            .lock()?
            .by_account
            .get(&account_id)
            .cloned()
            .unwrap_or_default();

        Ok(transactions)
    }
}

/// Erased [`PoisonError`]
///
/// `PoisonError` keeps the `MutexGuard` internally, which is not send. Thus we erase the error
/// and only keep the string representation instead.
#[derive(Debug, thiserror::Error)]
#[error("poison error: {0}")]
pub struct ErasedPoisonError(String);

impl<T> From<PoisonError<T>> for account_store::Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}

impl<T> From<PoisonError<T>> for history_store::Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}
