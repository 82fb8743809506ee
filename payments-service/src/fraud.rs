//! Explainable fraud heuristic.
//!
//! Three additive signals, clamped to `[0, 1]`:
//!
//! | Signal | Fires when | Default weight |
//! |---|---|---|
//! | velocity | requester made more than 5 payments in the last hour | 0.3 |
//! | amount anomaly | amount exceeds 3x the organization's rolling average | 0.2 |
//! | geographic anomaly | request location never seen for the requester | 0.2 |
//!
//! A score strictly above the review threshold (0.8) holds the payment. With
//! the default weights the maximum is 0.7, so holds only occur when an
//! operator raises the weights or lowers the threshold.

use crate::config::FraudConfig;
use crate::error::PaymentResult;
use crate::ledger::Ledger;
use crate::models::Actor;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudSignal {
    Velocity,
    AmountAnomaly,
    GeoAnomaly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAssessment {
    pub score: f64,
    pub signals: Vec<FraudSignal>,
}

impl FraudAssessment {
    pub fn requires_review(&self, threshold: f64) -> bool {
        self.score > threshold
    }
}

/// Historical facts the heuristic is computed from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FraudInputs {
    pub amount: i64,
    pub recent_requester_payments: usize,
    pub organization_average: Option<f64>,
    pub location: Option<String>,
    pub known_locations: Vec<String>,
}

/// Pure scoring function.
///
/// The amount signal needs an organization average and the geographic signal
/// needs both a request location and at least one previously seen location;
/// without history neither fires.
#[allow(clippy::cast_precision_loss)]
pub fn score(config: &FraudConfig, inputs: &FraudInputs) -> FraudAssessment {
    let mut signals = Vec::new();
    let mut total = 0.0;

    if inputs.recent_requester_payments > config.velocity_threshold {
        signals.push(FraudSignal::Velocity);
        total += config.velocity_weight;
    }

    if let Some(average) = inputs.organization_average {
        if inputs.amount as f64 > average * config.amount_multiplier {
            signals.push(FraudSignal::AmountAnomaly);
            total += config.amount_weight;
        }
    }

    // no history means no baseline to deviate from
    if let Some(location) = &inputs.location {
        if !inputs.known_locations.is_empty() && !inputs.known_locations.contains(location) {
            signals.push(FraudSignal::GeoAnomaly);
            total += config.geo_weight;
        }
    }

    let score = if total.is_finite() { total.clamp(0.0, 1.0) } else { 1.0 };
    FraudAssessment { score, signals }
}

pub struct FraudScorer {
    ledger: Arc<dyn Ledger>,
    config: FraudConfig,
}

impl FraudScorer {
    pub fn new(ledger: Arc<dyn Ledger>, config: FraudConfig) -> Self {
        Self { ledger, config }
    }

    pub fn review_threshold(&self) -> f64 {
        self.config.review_threshold
    }

    /// Gathers history for the actor and scores a charge of `amount`.
    ///
    /// # Errors
    ///
    /// Propagates ledger read failures.
    pub async fn assess(&self, actor: &Actor, amount: i64, now: DateTime<Utc>) -> PaymentResult<FraudAssessment> {
        let velocity_since = now - Duration::seconds(self.config.velocity_window_secs);
        let average_since = now - Duration::days(self.config.amount_window_days);

        let inputs = FraudInputs {
            amount,
            recent_requester_payments: self
                .ledger
                .requester_payment_count(actor.user_id, velocity_since)
                .await?,
            organization_average: self
                .ledger
                .organization_average_amount(actor.organization_id, average_since)
                .await?,
            location: actor.location.clone(),
            known_locations: self.ledger.requester_locations(actor.user_id).await?,
        };

        let assessment = score(&self.config, &inputs);
        debug!(
            requester_id = %actor.user_id,
            score = assessment.score,
            signals = ?assessment.signals,
            "Fraud assessment"
        );
        Ok(assessment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_no_history_scores_zero() {
        let assessment = score(
            &FraudConfig::default(),
            &FraudInputs {
                amount: 1_000_000,
                location: Some("US".to_string()),
                ..FraudInputs::default()
            },
        );
        assert!(close(assessment.score, 0.0));
        assert!(assessment.signals.is_empty());
    }

    #[test]
    fn test_all_signals_with_default_weights() {
        let assessment = score(
            &FraudConfig::default(),
            &FraudInputs {
                amount: 4_000,
                recent_requester_payments: 6,
                organization_average: Some(1_000.0),
                location: Some("BR".to_string()),
                known_locations: vec!["US".to_string()],
            },
        );
        assert!(close(assessment.score, 0.7));
        assert_eq!(
            assessment.signals,
            vec![FraudSignal::Velocity, FraudSignal::AmountAnomaly, FraudSignal::GeoAnomaly]
        );
        assert!(!assessment.requires_review(0.8));
    }

    #[test]
    fn test_first_location_is_not_a_geo_anomaly() {
        let assessment = score(
            &FraudConfig::default(),
            &FraudInputs {
                amount: 500,
                location: Some("BR".to_string()),
                known_locations: vec![],
                ..FraudInputs::default()
            },
        );
        assert!(!assessment.signals.contains(&FraudSignal::GeoAnomaly));
    }

    #[test]
    fn test_thresholds_are_strict() {
        let config = FraudConfig::default();
        let at_threshold = score(
            &config,
            &FraudInputs {
                amount: 3_000,
                recent_requester_payments: 5,
                organization_average: Some(1_000.0),
                location: Some("US".to_string()),
                known_locations: vec!["US".to_string()],
            },
        );
        assert!(at_threshold.signals.is_empty());

        let review = FraudAssessment {
            score: 0.8,
            signals: vec![],
        };
        assert!(!review.requires_review(0.8));
    }

    #[test]
    fn test_score_is_clamped() {
        let config = FraudConfig {
            velocity_weight: 0.9,
            amount_weight: 0.9,
            geo_weight: 0.9,
            ..FraudConfig::default()
        };
        let assessment = score(
            &config,
            &FraudInputs {
                amount: 10_000,
                recent_requester_payments: 50,
                organization_average: Some(10.0),
                location: Some("NZ".to_string()),
                known_locations: vec!["US".to_string()],
            },
        );
        assert!(close(assessment.score, 1.0));
        assert!(assessment.requires_review(config.review_threshold));
    }

    proptest! {
        #[test]
        fn prop_score_within_unit_interval(
            amount in 1_i64..10_000_000,
            recent in 0_usize..100,
            average in proptest::option::of(1.0_f64..1_000_000.0),
            weights in (-2.0_f64..2.0, -2.0_f64..2.0, -2.0_f64..2.0),
            new_location in any::<bool>(),
        ) {
            let config = FraudConfig {
                velocity_weight: weights.0,
                amount_weight: weights.1,
                geo_weight: weights.2,
                ..FraudConfig::default()
            };
            let inputs = FraudInputs {
                amount,
                recent_requester_payments: recent,
                organization_average: average,
                location: Some(if new_location { "XX" } else { "US" }.to_string()),
                known_locations: vec!["US".to_string()],
            };
            let assessment = score(&config, &inputs);
            prop_assert!((0.0..=1.0).contains(&assessment.score));
        }
    }
}
