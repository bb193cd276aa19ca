pub mod payment_event_consumer;
pub mod webhook_dispatcher;
