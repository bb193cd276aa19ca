pub mod models;
pub mod postgres_transaction_store;
