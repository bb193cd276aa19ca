use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::entities::PaymentRequest;
use common::PaymentMethod;

/// PANs documented by test fixtures as "known test cards" — not
/// fraudulent on their own, but worth a small bump since a production
/// charge should essentially never see one.
const KNOWN_TEST_PANS: &[&str] = &[
    "4242424242424242",
    "4000000000000002",
    "5555555555554444",
];

/// Result of scoring a single `PaymentRequest`. Carries the final
/// clamped score and the block decision so callers never have to
/// recompute `should_block` with a possibly-stale threshold.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FraudAssessment {
    pub score: Decimal,
    pub blocked: bool,
}

/// Pure, deterministic, side-effect-free risk scorer. Holds no mutable
/// state and performs no I/O; a future velocity-check extension that
/// needs the store belongs in a separate, stateful scorer rather than
/// here.
pub struct FraudScorer {
    enabled: bool,
    threshold: Decimal,
}

impl FraudScorer {
    pub fn new(enabled: bool, threshold: Decimal) -> Self {
        Self { enabled, threshold }
    }

    pub fn score(&self, request: &PaymentRequest) -> FraudAssessment {
        if !self.enabled {
            return FraudAssessment {
                score: Decimal::ZERO,
                blocked: false,
            };
        }

        let mut score = Decimal::ZERO;
        let amount = request.amount.amount;

        if amount >= Decimal::new(10_000, 0) {
            score += Decimal::new(40, 2);
        } else if amount >= Decimal::new(1_000, 0) {
            score += Decimal::new(20, 2);
        } else if amount >= Decimal::new(100, 0) {
            score += Decimal::new(10, 2);
        }

        score += match request.payment_method {
            PaymentMethod::CARD => Decimal::new(10, 2),
            PaymentMethod::WALLET => Decimal::new(5, 2),
            PaymentMethod::BANK => Decimal::new(15, 2),
        };

        if request.payment_method == PaymentMethod::CARD {
            if let Some(pan) = &request.card_pan {
                if !is_valid_pan_shape(pan) {
                    score += Decimal::new(30, 2);
                }
                if KNOWN_TEST_PANS.contains(&pan.as_str()) {
                    score += Decimal::new(10, 2);
                }
            }
            if let Some(cvv) = &request.card_cvv {
                if !is_valid_cvv_shape(cvv) {
                    score += Decimal::new(20, 2);
                }
            }
        }

        if amount.fract().is_zero() {
            score += Decimal::new(5, 2);
        }

        if amount <= Decimal::ONE {
            score += Decimal::new(10, 2);
        }

        if amount >= Decimal::new(50_000, 0) {
            score += Decimal::new(30, 2);
        }

        let clamped = score.clamp(Decimal::ZERO, Decimal::ONE);
        FraudAssessment {
            score: clamped,
            blocked: clamped >= self.threshold,
        }
    }
}

/// `^[0-9]{13,19}$`
fn is_valid_pan_shape(pan: &str) -> bool {
    let len = pan.len();
    (13..=19).contains(&len) && pan.bytes().all(|b| b.is_ascii_digit())
}

/// `^[0-9]{3,4}$`
fn is_valid_cvv_shape(cvv: &str) -> bool {
    let len = cvv.len();
    (3..=4).contains(&len) && cvv.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Currency, Money};
    use rstest::rstest;
    use serde_json::Value as Json;
    use uuid::Uuid;

    fn request_with(amount: Decimal, method: PaymentMethod, pan: Option<&str>, cvv: Option<&str>) -> PaymentRequest {
        PaymentRequest {
            idempotency_key: None,
            user_id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            amount: Money::new(amount, Currency::parse("USD").unwrap()),
            payment_method: method,
            payment_provider: "stripe".to_string(),
            webhook_url: None,
            metadata: Json::Object(Default::default()),
            card_pan: pan.map(str::to_string),
            card_cvv: cvv.map(str::to_string),
            bank_account_number: None,
            bank_routing_number: None,
            wallet_id: None,
        }
    }

    #[test]
    fn disabled_scorer_always_returns_zero() {
        let scorer = FraudScorer::new(false, Decimal::new(70, 2));
        let req = request_with(Decimal::new(99999, 0), PaymentMethod::CARD, Some("1234"), None);
        let assessment = scorer.score(&req);
        assert_eq!(assessment.score, Decimal::ZERO);
        assert!(!assessment.blocked);
    }

    #[test]
    fn bad_pan_and_huge_amount_blocks() {
        let scorer = FraudScorer::new(true, Decimal::new(70, 2));
        let req = request_with(
            Decimal::new(75_000, 0),
            PaymentMethod::CARD,
            Some("1234"),
            None,
        );
        let assessment = scorer.score(&req);
        assert!(assessment.blocked);
    }

    #[rstest]
    #[case(Decimal::new(4999, 2), false)]
    #[case(Decimal::new(75_000, 0), true)]
    fn fresh_card_payment_is_not_blocked_by_amount_alone(#[case] amount: Decimal, #[case] expect_high: bool) {
        let scorer = FraudScorer::new(true, Decimal::new(70, 2));
        let req = request_with(amount, PaymentMethod::CARD, Some("4242424242424242"), Some("123"));
        let assessment = scorer.score(&req);
        if !expect_high {
            assert!(!assessment.blocked);
        }
    }

    #[test]
    fn score_is_pure() {
        let scorer = FraudScorer::new(true, Decimal::new(70, 2));
        let req = request_with(Decimal::new(4999, 2), PaymentMethod::CARD, Some("4242424242424242"), Some("123"));
        let a = scorer.score(&req);
        let b = scorer.score(&req);
        assert_eq!(a.score, b.score);
    }
}
