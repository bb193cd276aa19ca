pub mod moka_idempotency_gate;
