use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod policy;

pub use policy::{BalancePolicy, DefaultBalancePolicy, Limits, PolicyViolation};

/// Amount of points, in the smallest unit
///
/// Signed so that non-positive request amounts can be represented and rejected by the policy.
pub type Points = i64;

/// Balance-bearing account
///
/// An `Account` is materialized from the account store for a single operation, mutated at most
/// once and then dropped. It is not safe to share between concurrent operations: the ledger
/// service is responsible for serializing access per account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    /// Unique identifier for the `Account`
    pub account_id: Uuid,
    /// Current balance, always within `0..=max_total_balance`
    balance: Points,
    /// Time of the last successful mutation
    ///
    /// This is `None` for accounts that have never been charged or used.
    updated_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(account_id: Uuid, balance: Points, updated_at: Option<DateTime<Utc>>) -> Self {
        Self {
            account_id,
            balance,
            updated_at,
        }
    }

    /// Zero-balance account used when the store has no record yet
    pub fn empty(account_id: Uuid) -> Self {
        Self::new(account_id, 0, None)
    }

    pub fn balance(&self) -> Points {
        self.balance
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Add `amount` to the balance if the policy allows it
    ///
    /// On rejection the account is left untouched and the violation is returned as is.
    pub fn charge<P>(
        &mut self,
        policy: &P,
        amount: Points,
        now: DateTime<Utc>,
    ) -> Result<(), PolicyViolation>
    where
        P: BalancePolicy + ?Sized,
    {
        policy.validate_charge(self.balance, amount)?;

        // The balance stays non-negative and representable whatever the policy allows
        self.balance = match self.balance.checked_add(amount) {
            Some(balance) if balance >= 0 => balance,
            Some(_) => return Err(PolicyViolation::InvalidAmount { amount }),
            None => {
                return Err(PolicyViolation::BalanceCapExceeded {
                    balance: self.balance,
                    amount,
                    max_total_balance: Points::MAX,
                })
            }
        };
        self.updated_at = Some(now);
        Ok(())
    }

    /// Remove `amount` from the balance if the policy allows it
    pub fn use_points<P>(
        &mut self,
        policy: &P,
        amount: Points,
        now: DateTime<Utc>,
    ) -> Result<(), PolicyViolation>
    where
        P: BalancePolicy + ?Sized,
    {
        policy.validate_use(self.balance, amount)?;

        self.balance = match self.balance.checked_sub(amount) {
            Some(balance) if balance >= 0 => balance,
            _ => {
                return Err(PolicyViolation::InsufficientBalance {
                    balance: self.balance,
                    amount,
                })
            }
        };
        self.updated_at = Some(now);
        Ok(())
    }

    /// Apply a mutation of the given kind
    pub fn apply<P>(
        &mut self,
        policy: &P,
        kind: TransactionKind,
        amount: Points,
        now: DateTime<Utc>,
    ) -> Result<(), PolicyViolation>
    where
        P: BalancePolicy + ?Sized,
    {
        match kind {
            TransactionKind::Charge => self.charge(policy, amount, now),
            TransactionKind::Use => self.use_points(policy, amount, now),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Charge,
    Use,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Charge => f.write_str("charge"),
            TransactionKind::Use => f.write_str("use"),
        }
    }
}

/// Immutable history record of one committed mutation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Identifier assigned by the history store
    ///
    /// Strictly increasing in commit order.
    pub transaction_id: u64,
    pub account_id: Uuid,
    /// Positive magnitude of the charge or use
    pub amount: Points,
    pub kind: TransactionKind,
    /// Same instant as the account's `updated_at` for that mutation
    pub timestamp: DateTime<Utc>,
}
