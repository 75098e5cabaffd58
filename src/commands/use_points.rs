use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tower::Service;
use uuid::Uuid;

use crate::{
    domain::{Account, Points, Transaction, TransactionKind},
    ports::{account_store::AccountStore, history_store::HistoryStore},
};

use super::{Error, LedgerService};

#[derive(Clone, Debug)]
pub struct UseRequest {
    pub account_id: Uuid,
    pub amount: Points,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UseResponse {
    pub account_id: Uuid,
    pub old_balance: Points,
    pub new_balance: Points,
    pub transaction: Transaction,
}

impl<A, H> LedgerService<A, H>
where
    A: AccountStore + 'static,
    H: HistoryStore + 'static,
{
    /// Spend points from an account
    #[tracing::instrument(skip(self))]
    pub async fn use_points(&self, account_id: Uuid, amount: Points) -> Result<Account, Error> {
        let commit = self
            .mutate(account_id, TransactionKind::Use, amount)
            .await?;
        Ok(commit.account)
    }
}

impl<A, H> Service<UseRequest> for LedgerService<A, H>
where
    A: AccountStore + 'static,
    H: HistoryStore + 'static,
{
    type Response = UseResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: UseRequest) -> Self::Future {
        let ledger = self.clone();
        Box::pin(async move {
            let commit = ledger
                .mutate(req.account_id, TransactionKind::Use, req.amount)
                .await?;

            Ok(UseResponse {
                account_id: req.account_id,
                old_balance: commit.previous_balance,
                new_balance: commit.account.balance(),
                transaction: commit.transaction,
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
        domain::PolicyViolation,
    };
    use rstest::*;
    use speculoos::prelude::*;
    use tower::{BoxError, ServiceExt};

    type MemoryLedger = LedgerService<MemoryAccountStore, MemoryHistoryStore>;

    #[fixture]
    fn account_id() -> Uuid {
        Uuid::new_v4()
    }

    #[fixture]
    fn ledger() -> MemoryLedger {
        LedgerService::new(MemoryAccountStore::new(), MemoryHistoryStore::new())
    }

    #[rstest]
    #[tokio::test]
    async fn test_use_after_charge(ledger: MemoryLedger, account_id: Uuid) {
        // GIVEN an account with 10000 points
        ledger.charge(account_id, 10_000).await.unwrap();

        // WHEN using 5000 points
        let res = ledger.use_points(account_id, 5_000).await;

        // THEN the balance drops and both mutations are in the history
        assert_that!(res)
            .is_ok()
            .matches(|account| account.balance() == 5_000);
        let kinds: Vec<_> = ledger
            .history(account_id)
            .await
            .unwrap()
            .into_iter()
            .map(|tx| (tx.kind, tx.amount))
            .collect();
        assert_that!(kinds).is_equal_to(vec![
            (TransactionKind::Charge, 10_000),
            (TransactionKind::Use, 5_000),
        ]);
    }

    #[rstest]
    #[tokio::test]
    async fn test_use_full_balance(ledger: MemoryLedger, account_id: Uuid) {
        ledger.charge(account_id, 10_000).await.unwrap();

        let res = ledger.use_points(account_id, 10_000).await;

        assert_that!(res)
            .is_ok()
            .matches(|account| account.balance() == 0);
    }

    #[rstest]
    #[case(0, ErrorKind::InvalidAmount)]
    #[case(-1, ErrorKind::InvalidAmount)]
    #[case(10_001, ErrorKind::InsufficientBalance)]
    #[tokio::test]
    async fn test_use_rejected(
        ledger: MemoryLedger,
        account_id: Uuid,
        #[case] amount: Points,
        #[case] expected: ErrorKind,
    ) {
        // GIVEN an account with 10000 points
        let charged = ledger.charge(account_id, 10_000).await.unwrap();

        // WHEN using an invalid amount
        let res = ledger.use_points(account_id, amount).await;

        // THEN it fails and the account and history are untouched
        assert_that!(res)
            .is_err()
            .matches(|err| err.kind() == expected);
        let account = ledger.balance(account_id).await.unwrap();
        assert_that!(account).is_equal_to(charged);
        assert_that!(ledger.history(account_id).await.unwrap()).has_length(1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_use_on_empty_account(ledger: MemoryLedger, account_id: Uuid) {
        let res = ledger.use_points(account_id, 1).await;

        assert_that!(res).is_err().matches(|err| {
            matches!(
                err,
                Error::Policy(PolicyViolation::InsufficientBalance {
                    balance: 0,
                    amount: 1
                })
            )
        });
        // A rejected use does not create the account
        assert_that!(ledger.require_balance(account_id).await)
            .is_err()
            .matches(|err| err.kind() == ErrorKind::AccountNotFound);
    }

    #[rstest]
    #[tokio::test]
    async fn test_call(mut ledger: MemoryLedger, account_id: Uuid) -> Result<(), BoxError> {
        ledger.charge(account_id, 1_000).await?;

        let req = UseRequest {
            account_id,
            amount: 400,
        };
        let res = ServiceExt::<UseRequest>::ready(&mut ledger)
            .await?
            .call(req)
            .await;

        assert_that!(res).is_ok().matches(|res| {
            res.old_balance == 1_000
                && res.new_balance == 600
                && res.transaction.kind == TransactionKind::Use
                && res.transaction.amount == 400
        });

        Ok(())
    }
}
