use super::Points;

/// Largest amount accepted in a single charge
pub const MAX_SINGLE_CHARGE: Points = 100_000;
/// Largest balance an account may hold
pub const MAX_TOTAL_BALANCE: Points = 1_000_000;
/// Smallest amount accepted in a single use
pub const MIN_USE_AMOUNT: Points = 1;

/// Rules deciding whether a charge or use may be applied to a balance
///
/// Implementations must be pure: no state, no I/O, same answer for the same inputs.
pub trait BalancePolicy: Send + Sync {
    fn validate_charge(&self, balance: Points, amount: Points) -> Result<(), PolicyViolation>;
    fn validate_use(&self, balance: Points, amount: Points) -> Result<(), PolicyViolation>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_single_charge: Points,
    pub max_total_balance: Points,
    pub min_use_amount: Points,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_single_charge: MAX_SINGLE_CHARGE,
            max_total_balance: MAX_TOTAL_BALANCE,
            min_use_amount: MIN_USE_AMOUNT,
        }
    }
}

/// Limit-based policy
///
/// Both limits are inclusive: charging exactly up to the cap, or using exactly the full
/// balance, is allowed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DefaultBalancePolicy {
    limits: Limits,
}

impl DefaultBalancePolicy {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }
}

impl BalancePolicy for DefaultBalancePolicy {
    fn validate_charge(
        &self,
        current_balance: Points,
        amount: Points,
    ) -> Result<(), PolicyViolation> {
        if amount <= 0 {
            return Err(PolicyViolation::InvalidAmount { amount });
        }
        if amount > self.limits.max_single_charge {
            return Err(PolicyViolation::ChargeLimitExceeded {
                amount,
                max_single_charge: self.limits.max_single_charge,
            });
        }
        match current_balance.checked_add(amount) {
            Some(total) if total <= self.limits.max_total_balance => Ok(()),
            _ => Err(PolicyViolation::BalanceCapExceeded {
                balance: current_balance,
                amount,
                max_total_balance: self.limits.max_total_balance,
            }),
        }
    }

    fn validate_use(&self, current_balance: Points, amount: Points) -> Result<(), PolicyViolation> {
        // A minimum below 1 would let zero or negative uses through
        if amount < self.limits.min_use_amount.max(1) {
            return Err(PolicyViolation::InvalidAmount { amount });
        }
        if amount > current_balance {
            return Err(PolicyViolation::InsufficientBalance {
                balance: current_balance,
                amount,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    /// Non-positive charge, or use below the minimum amount
    #[error("invalid amount: {amount}")]
    InvalidAmount { amount: Points },

    #[error("charge of {amount} exceeds the single charge limit of {max_single_charge}")]
    ChargeLimitExceeded {
        amount: Points,
        max_single_charge: Points,
    },

    /// The resulting balance would be above the maximum total
    #[error("charging {amount} onto {balance} exceeds the balance cap of {max_total_balance}")]
    BalanceCapExceeded {
        balance: Points,
        amount: Points,
        max_total_balance: Points,
    },

    #[error("trying to use {amount} points with a balance of {balance}")]
    InsufficientBalance { balance: Points, amount: Points },
}
