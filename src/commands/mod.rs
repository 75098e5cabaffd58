use std::{borrow::Cow, fmt, sync::Arc};

use uuid::Uuid;

use crate::{
    adapters::clock::SystemClock,
    config::LedgerConfig,
    domain::{
        Account, BalancePolicy, DefaultBalancePolicy, Points, PolicyViolation, Transaction,
        TransactionKind,
    },
    ports::{account_store::AccountStore, clock::Clock, history_store::HistoryStore},
};

pub mod charge;
pub mod get_balance;
pub mod get_history;
pub mod locks;
pub mod use_points;

use locks::AccountLocks;

/// Entry point for reading and mutating balances
///
/// Cloning is cheap and every clone shares the same stores and exclusive sections, so a single
/// service can be handed out to any number of concurrent callers.
pub struct LedgerService<A, H> {
    accounts: Arc<A>,
    history: Arc<H>,
    clock: Arc<dyn Clock>,
    policy: Arc<dyn BalancePolicy>,
    locks: Arc<AccountLocks>,
}

impl<A, H> Clone for LedgerService<A, H> {
    fn clone(&self) -> Self {
        Self {
            accounts: self.accounts.clone(),
            history: self.history.clone(),
            clock: self.clock.clone(),
            policy: self.policy.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<A, H> LedgerService<A, H>
where
    A: AccountStore + 'static,
    H: HistoryStore + 'static,
{
    pub fn new(accounts: A, history: H) -> Self {
        Self {
            accounts: Arc::new(accounts),
            history: Arc::new(history),
            clock: Arc::new(SystemClock),
            policy: Arc::new(DefaultBalancePolicy::default()),
            locks: Arc::new(AccountLocks::default()),
        }
    }

    pub fn from_config(accounts: A, history: H, config: &LedgerConfig) -> Self {
        Self {
            policy: Arc::new(DefaultBalancePolicy::new(config.limits)),
            locks: Arc::new(AccountLocks::new(config.lock_sweep_threshold)),
            ..Self::new(accounts, history)
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_policy(mut self, policy: impl BalancePolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn locks(&self) -> &AccountLocks {
        &self.locks
    }

    /// Apply one mutation inside the account's exclusive section
    ///
    /// Waiting for the section can be cancelled by dropping the future. Once the section is
    /// held, the read-validate-write-append sequence runs in its own task and completes even if
    /// the caller goes away.
    async fn mutate(
        &self,
        account_id: Uuid,
        kind: TransactionKind,
        amount: Points,
    ) -> Result<Commit, Error> {
        let guard = self.locks.acquire(account_id).await;

        let accounts = self.accounts.clone();
        let history = self.history.clone();
        let clock = self.clock.clone();
        let policy = self.policy.clone();
        let task = tokio::spawn(async move {
            let res = commit(
                &*accounts, &*history, &*clock, &*policy, account_id, kind, amount,
            )
            .await;
            drop(guard);
            res
        });

        task.await
            .map_err(|err| Error::CommitAborted(err.to_string().into()))?
    }
}

/// Outcome of a committed mutation
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Commit {
    pub previous_balance: Points,
    pub account: Account,
    pub transaction: Transaction,
}

async fn commit<A, H>(
    accounts: &A,
    history: &H,
    clock: &dyn Clock,
    policy: &dyn BalancePolicy,
    account_id: Uuid,
    kind: TransactionKind,
    amount: Points,
) -> Result<Commit, Error>
where
    A: AccountStore + ?Sized,
    H: HistoryStore + ?Sized,
{
    let mut account = accounts
        .read(account_id)
        .await
        .map_err(|err| Error::persistence(PersistenceStep::ReadAccount, err))?
        .map(Account::from)
        .unwrap_or_else(|| Account::empty(account_id));
    let previous_balance = account.balance();

    let now = clock.now();
    if let Err(violation) = account.apply(policy, kind, amount, now) {
        tracing::debug!(
            %account_id,
            %kind,
            amount,
            balance = previous_balance,
            %violation,
            "mutation rejected"
        );
        return Err(violation.into());
    }

    let record = accounts
        .write(account_id, account.balance(), now)
        .await
        .map_err(|err| Error::persistence(PersistenceStep::WriteBalance, err))?;

    let transaction = match history.append(account_id, amount, kind, now).await {
        Ok(transaction) => transaction,
        Err(err) => {
            // The balance is already committed and will be seen by the next operation
            tracing::error!(
                %account_id,
                %kind,
                amount,
                committed_balance = record.balance,
                error = %err,
                "balance committed but history append failed"
            );
            return Err(Error::persistence(PersistenceStep::AppendHistory, err));
        }
    };

    tracing::info!(
        %account_id,
        %kind,
        amount,
        previous_balance,
        balance = record.balance,
        transaction_id = transaction.transaction_id,
        "mutation committed"
    );

    Ok(Commit {
        previous_balance,
        account: record.into(),
        transaction,
    })
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    /// Only returned by strict lookups; mutations treat absent accounts as empty
    #[error("account {0} does not exist")]
    AccountNotFound(Uuid),

    /// A store call failed
    ///
    /// When `step` is [`PersistenceStep::AppendHistory`], the new balance has already been
    /// written and is not rolled back.
    #[error("persistence failure while {step}: {source}")]
    Persistence {
        step: PersistenceStep,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The commit task panicked or was aborted by the runtime
    #[error("commit aborted: {0}")]
    CommitAborted(Cow<'static, str>),
}

impl Error {
    fn persistence(
        step: PersistenceStep,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Persistence {
            step,
            source: Box::new(source),
        }
    }

    /// Flattened classification for the request layer
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Policy(PolicyViolation::InvalidAmount { .. }) => ErrorKind::InvalidAmount,
            Error::Policy(PolicyViolation::ChargeLimitExceeded { .. }) => {
                ErrorKind::ChargeLimitExceeded
            }
            Error::Policy(PolicyViolation::BalanceCapExceeded { .. }) => {
                ErrorKind::BalanceCapExceeded
            }
            Error::Policy(PolicyViolation::InsufficientBalance { .. }) => {
                ErrorKind::InsufficientBalance
            }
            Error::AccountNotFound(_) => ErrorKind::AccountNotFound,
            Error::Persistence { .. } | Error::CommitAborted(_) => ErrorKind::PersistenceFailure,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidAmount,
    ChargeLimitExceeded,
    BalanceCapExceeded,
    InsufficientBalance,
    AccountNotFound,
    PersistenceFailure,
}

/// Store call that failed during an operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistenceStep {
    ReadAccount,
    WriteBalance,
    AppendHistory,
    ReadHistory,
}

impl fmt::Display for PersistenceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceStep::ReadAccount => f.write_str("reading the account"),
            PersistenceStep::WriteBalance => f.write_str("writing the balance"),
            PersistenceStep::AppendHistory => f.write_str("appending history"),
            PersistenceStep::ReadHistory => f.write_str("reading history"),
        }
    }
}

/// Fixed instant used by tests that need reproducible timestamps
#[cfg(test)]
pub(crate) fn fixed_now() -> chrono::DateTime<chrono::Utc> {
    use chrono::{TimeZone, Utc};
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}
