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
pub struct ChargeRequest {
    pub account_id: Uuid,
    pub amount: Points,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChargeResponse {
    pub account_id: Uuid,
    /// Balance before the charge
    pub old_balance: Points,
    /// Balance after the charge
    pub new_balance: Points,
    /// History record of the charge
    pub transaction: Transaction,
}

impl<A, H> LedgerService<A, H>
where
    A: AccountStore + 'static,
    H: HistoryStore + 'static,
{
    /// Add points to an account
    ///
    /// Accounts without a stored balance start from zero.
    #[tracing::instrument(skip(self))]
    pub async fn charge(&self, account_id: Uuid, amount: Points) -> Result<Account, Error> {
        let commit = self
            .mutate(account_id, TransactionKind::Charge, amount)
            .await?;
        Ok(commit.account)
    }
}

impl<A, H> Service<ChargeRequest> for LedgerService<A, H>
where
    A: AccountStore + 'static,
    H: HistoryStore + 'static,
{
    type Response = ChargeResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ChargeRequest) -> Self::Future {
        let ledger = self.clone();
        Box::pin(async move {
            let commit = ledger
                .mutate(req.account_id, TransactionKind::Charge, req.amount)
                .await?;

            Ok(ChargeResponse {
                account_id: req.account_id,
                old_balance: commit.previous_balance,
                new_balance: commit.account.balance(),
                transaction: commit.transaction,
            })
        })
    }
}
