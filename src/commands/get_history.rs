use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower::Service;
use uuid::Uuid;

use crate::{
    domain::Transaction,
    ports::{account_store::AccountStore, history_store::HistoryStore},
};

use super::{Error, LedgerService, PersistenceStep};

#[derive(Clone, Debug)]
pub struct HistoryRequest {
    pub account_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryResponse {
    pub account_id: Uuid,
    /// Committed mutations, oldest first
    pub transactions: Vec<Transaction>,
}

impl<A, H> LedgerService<A, H>
where
    A: AccountStore + 'static,
    H: HistoryStore + 'static,
{
    /// Committed mutations of an account, in commit order
    ///
    /// Accounts without history get an empty list.
    pub async fn history(&self, account_id: Uuid) -> Result<Vec<Transaction>, Error> {
        self.history
            .list_by_account(account_id)
            .await
            .map_err(|err| Error::persistence(PersistenceStep::ReadHistory, err))
    }
}

impl<A, H> Service<HistoryRequest> for LedgerService<A, H>
where
    A: AccountStore + 'static,
    H: HistoryStore + 'static,
{
    type Response = HistoryResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: HistoryRequest) -> Self::Future {
        let ledger = self.clone();
        Box::pin(async move {
            let transactions = ledger.history(req.account_id).await?;

            Ok(HistoryResponse {
                account_id: req.account_id,
                transactions,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::database::memory::{MemoryAccountStore, MemoryHistoryStore},
        commands::ErrorKind,
        domain::TransactionKind,
        ports::history_store::{self, MockHistoryStore},
    };
    use rstest::*;
    use speculoos::prelude::*;
    use tower::{BoxError, ServiceExt};

    #[fixture]
    fn account_id() -> Uuid {
        Uuid::new_v4()
    }

    #[rstest]
    #[tokio::test]
    async fn test_history_empty(account_id: Uuid) {
        let ledger = LedgerService::new(MemoryAccountStore::new(), MemoryHistoryStore::new());

        let res = ledger.history(account_id).await;

        assert_that!(res).is_ok().is_empty();
    }

    #[rstest]
    #[tokio::test]
    async fn test_history_in_commit_order(account_id: Uuid) {
        // GIVEN a sequence of mutations
        let ledger = LedgerService::new(MemoryAccountStore::new(), MemoryHistoryStore::new());
        ledger.charge(account_id, 100).await.unwrap();
        ledger.charge(account_id, 200).await.unwrap();
        ledger.use_points(account_id, 50).await.unwrap();

        // WHEN reading the history
        let res = ledger.history(account_id).await.unwrap();

        // THEN it lists them oldest first
        let kinds: Vec<_> = res.iter().map(|tx| tx.kind).collect();
        let amounts: Vec<_> = res.iter().map(|tx| tx.amount).collect();
        assert_that!(kinds).is_equal_to(vec![
            TransactionKind::Charge,
            TransactionKind::Charge,
            TransactionKind::Use,
        ]);
        assert_that!(amounts).is_equal_to(vec![100, 200, 50]);
        let ordered = res
            .windows(2)
            .all(|w| w[0].transaction_id < w[1].transaction_id);
        assert_that!(ordered).is_true();
        assert_that!(ledger.balance(account_id).await.unwrap().balance()).is_equal_to(250);
    }

    #[rstest]
    #[tokio::test]
    async fn test_history_read_failure(account_id: Uuid) {
        #[derive(Debug, thiserror::Error)]
        #[error("store unavailable")]
        struct Unavailable;

        let mut history = MockHistoryStore::new();
        history
            .expect_list_by_account()
            .returning(|_| Err(history_store::Error::Adapter(Box::new(Unavailable))));
        let ledger = LedgerService::new(MemoryAccountStore::new(), history);

        let res = ledger.history(account_id).await;

        assert_that!(res)
            .is_err()
            .matches(|err| err.kind() == ErrorKind::PersistenceFailure);
    }

    #[rstest]
    #[tokio::test]
    async fn test_call(account_id: Uuid) -> Result<(), BoxError> {
        let mut ledger = LedgerService::new(MemoryAccountStore::new(), MemoryHistoryStore::new());
        ledger.charge(account_id, 10).await?;

        let res = ServiceExt::<HistoryRequest>::ready(&mut ledger)
            .await?
            .call(HistoryRequest { account_id })
            .await;

        assert_that!(res).is_ok().matches(|res| {
            res.account_id == account_id
                && res.transactions.len() == 1
                && res.transactions[0].amount == 10
        });

        Ok(())
    }
}
