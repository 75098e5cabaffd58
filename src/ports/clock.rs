use chrono::{DateTime, Utc};

/// Source of the timestamps stamped on mutations
#[mockall::automock]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
