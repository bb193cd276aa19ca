pub mod cache;
pub mod event_bus;
pub mod persistence;
pub mod providers;
