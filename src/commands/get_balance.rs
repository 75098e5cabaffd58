use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use chrono::{DateTime, Utc};
use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{Account, Points},
    ports::{account_store::AccountStore, history_store::HistoryStore},
};

use super::{Error, LedgerService, PersistenceStep};

#[derive(Clone, Debug)]
pub struct BalanceRequest {
    pub account_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalanceResponse {
    pub account_id: Uuid,
    pub balance: Points,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Account> for BalanceResponse {
    fn from(account: Account) -> Self {
        Self {
            account_id: account.account_id,
            balance: account.balance(),
            updated_at: account.updated_at(),
        }
    }
}

impl<A, H> LedgerService<A, H>
where
    A: AccountStore + 'static,
    H: HistoryStore + 'static,
{
    /// Current state of an account
    ///
    /// Accounts without a stored balance are returned as empty; nothing is created. Reads do not
    /// take the account's exclusive section and see either side of an in-flight mutation.
    pub async fn balance(&self, account_id: Uuid) -> Result<Account, Error> {
        Ok(self
            .find(account_id)
            .await?
            .unwrap_or_else(|| Account::empty(account_id)))
    }

    /// Like [`balance`](Self::balance), but an account without a stored balance is an error
    pub async fn require_balance(&self, account_id: Uuid) -> Result<Account, Error> {
        self.find(account_id)
            .await?
            .ok_or(Error::AccountNotFound(account_id))
    }

    async fn find(&self, account_id: Uuid) -> Result<Option<Account>, Error> {
        let record = self
            .accounts
            .read(account_id)
            .await
            .map_err(|err| Error::persistence(PersistenceStep::ReadAccount, err))?;

        Ok(record.map(Account::from))
    }
}

impl<A, H> Service<BalanceRequest> for LedgerService<A, H>
where
    A: AccountStore + 'static,
    H: HistoryStore + 'static,
{
    type Response = BalanceResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: BalanceRequest) -> Self::Future {
        let ledger = self.clone();
        Box::pin(async move { Ok(ledger.balance(req.account_id).await?.into()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::database::memory::MemoryHistoryStore,
        commands::ErrorKind,
        ports::account_store::{AccountRecord, MockAccountStore},
    };
    use mockall::predicate::*;
    use rstest::*;
    use speculoos::prelude::*;
    use tower::{BoxError, ServiceExt};

    #[fixture]
    fn account_id() -> Uuid {
        Uuid::new_v4()
    }

    #[rstest]
    #[tokio::test]
    async fn test_balance_absent_is_empty(account_id: Uuid) {
        // GIVEN a store without the account
        let mut accounts = MockAccountStore::new();
        accounts
            .expect_read()
            .times(1)
            .with(eq(account_id))
            .returning(|_| Ok(None));
        accounts.expect_write().never();
        let ledger = LedgerService::new(accounts, MemoryHistoryStore::new());

        // WHEN reading the balance
        let res = ledger.balance(account_id).await;

        // THEN it is an empty account and nothing gets written
        assert_that!(res)
            .is_ok()
            .is_equal_to(Account::empty(account_id));
    }

    #[rstest]
    #[tokio::test]
    async fn test_require_balance_absent(account_id: Uuid) {
        let mut accounts = MockAccountStore::new();
        accounts.expect_read().returning(|_| Ok(None));
        let ledger = LedgerService::new(accounts, MemoryHistoryStore::new());

        let res = ledger.require_balance(account_id).await;

        assert_that!(res)
            .is_err()
            .matches(|err| err.kind() == ErrorKind::AccountNotFound);
    }

    #[rstest]
    #[tokio::test]
    async fn test_call(account_id: Uuid) -> Result<(), BoxError> {
        // GIVEN a stored balance
        let updated_at = Utc::now();
        let mut accounts = MockAccountStore::new();
        accounts
            .expect_read()
            .times(1)
            .with(eq(account_id))
            .returning(move |account_id| {
                Ok(Some(AccountRecord {
                    account_id,
                    balance: 1_234,
                    updated_at,
                }))
            });
        let mut ledger = LedgerService::new(accounts, MemoryHistoryStore::new());

        // WHEN calling the service
        let res = ServiceExt::<BalanceRequest>::ready(&mut ledger)
            .await?
            .call(BalanceRequest { account_id })
            .await;

        // THEN it returns the stored state
        assert_that!(res).is_ok().is_equal_to(BalanceResponse {
            account_id,
            balance: 1_234,
            updated_at: Some(updated_at),
        });

        Ok(())
    }
}
