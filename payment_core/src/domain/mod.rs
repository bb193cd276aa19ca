pub mod entities;
pub mod error;
pub mod event_bus;
pub mod fraud;
pub mod gateways;
pub mod idempotency;
pub mod repository;
