use serde::{Deserialize, Serialize};

/// Routing classification for a payment instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CARD,
    WALLET,
    BANK,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::CARD => write!(f, "CARD"),
            PaymentMethod::WALLET => write!(f, "WALLET"),
            PaymentMethod::BANK => write!(f, "BANK"),
        }
    }
}
