//! Payment Core
//!
//! Orchestrates payment initiation, provider settlement and webhook
//! delivery for downstream merchants, exporting the modules shared by
//! the application binary and integration tests.
//!
//! # Modules
//!
//! * `api` - HTTP surface (axum handlers, DTOs, error mapping).
//! * `config` - environment-driven runtime configuration.
//! * `domain` - entities, ports (traits) and business rules.
//! * `infrastructure` - concrete implementations of the domain ports.
//! * `jobs` - background workers (event consumer, webhook dispatcher).
//! * `use_cases` - application workflows built on top of the ports.

pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod jobs;
pub mod use_cases;

pub mod proto {
    pub mod provider {
        tonic::include_proto!("provider");
    }
}
