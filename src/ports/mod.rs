pub mod account_store;
pub mod clock;
pub mod history_store;
