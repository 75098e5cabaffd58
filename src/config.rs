use crate::{commands::locks::DEFAULT_SWEEP_THRESHOLD, domain::Limits};

pub const MAX_SINGLE_CHARGE_VAR: &str = "POINT_LEDGER_MAX_SINGLE_CHARGE";
pub const MAX_TOTAL_BALANCE_VAR: &str = "POINT_LEDGER_MAX_TOTAL_BALANCE";
pub const MIN_USE_AMOUNT_VAR: &str = "POINT_LEDGER_MIN_USE_AMOUNT";
pub const LOCK_SWEEP_THRESHOLD_VAR: &str = "POINT_LEDGER_LOCK_SWEEP_THRESHOLD";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Limits enforced by the default balance policy
    pub limits: Limits,
    /// Registry size at which idle account sections are swept
    pub lock_sweep_threshold: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            lock_sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
        }
    }
}

impl LedgerConfig {
    /// Load from `POINT_LEDGER_*` variables, falling back to defaults for unset ones
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let limits = Limits {
            max_single_charge: parse_or(
                &lookup,
                MAX_SINGLE_CHARGE_VAR,
                defaults.limits.max_single_charge,
            )?,
            max_total_balance: parse_or(
                &lookup,
                MAX_TOTAL_BALANCE_VAR,
                defaults.limits.max_total_balance,
            )?,
            min_use_amount: parse_or(&lookup, MIN_USE_AMOUNT_VAR, defaults.limits.min_use_amount)?,
        };
        let lock_sweep_threshold = parse_or(
            &lookup,
            LOCK_SWEEP_THRESHOLD_VAR,
            defaults.lock_sweep_threshold,
        )?;

        let config = Self {
            limits,
            lock_sweep_threshold,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        if limits.max_single_charge <= 0 {
            return Err(ConfigError::Invalid(format!(
                "{MAX_SINGLE_CHARGE_VAR} must be positive, got {}",
                limits.max_single_charge
            )));
        }
        if limits.max_total_balance < limits.max_single_charge {
            return Err(ConfigError::Invalid(format!(
                "{MAX_TOTAL_BALANCE_VAR} ({}) is below {MAX_SINGLE_CHARGE_VAR} ({})",
                limits.max_total_balance, limits.max_single_charge
            )));
        }
        if limits.min_use_amount < 1 {
            return Err(ConfigError::Invalid(format!(
                "{MIN_USE_AMOUNT_VAR} must be at least 1, got {}",
                limits.min_use_amount
            )));
        }
        if self.lock_sweep_threshold == 0 {
            return Err(ConfigError::Invalid(format!(
                "{LOCK_SWEEP_THRESHOLD_VAR} must be at least 1"
            )));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse() {
            Ok(value) => Ok(value),
            Err(err) => Err(ConfigError::Malformed {
                key,
                value: raw.clone(),
                reason: format!("{err}"),
            }),
        },
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is malformed: {reason}")]
    Malformed {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
