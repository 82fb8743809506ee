//! Typed view of processor webhook events.

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid event payload: {0}")]
pub struct EventParseError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundUpdate {
    pub reference_id: String,
    /// Raw processor status
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    PaymentSucceeded {
        payment_reference: String,
    },
    PaymentFailed {
        payment_reference: String,
    },
    ChargeRefunded {
        payment_reference: String,
        refunds: Vec<RefundUpdate>,
    },
    DisputeCreated {
        payment_reference: String,
        dispute_id: String,
        reason: Option<String>,
    },
    /// Event type this engine does not act on. Acknowledged and logged.
    Unhandled {
        event_type: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorEvent {
    pub id: String,
    pub event_type: String,
    pub kind: EventKind,
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Option<RawData>,
}

#[derive(Deserialize)]
struct RawData {
    object: serde_json::Value,
}

#[derive(Deserialize)]
struct PaymentIntentObject {
    id: String,
}

#[derive(Deserialize)]
struct ChargeObject {
    payment_intent: Option<String>,
    #[serde(default)]
    refunds: Option<RefundList>,
}

#[derive(Deserialize)]
struct RefundList {
    #[serde(default)]
    data: Vec<RefundObject>,
}

#[derive(Deserialize)]
struct RefundObject {
    id: String,
    status: String,
}

#[derive(Deserialize)]
struct DisputeObject {
    id: String,
    payment_intent: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

fn object<T: for<'de> Deserialize<'de>>(data: Option<RawData>, event_type: &str) -> Result<T, EventParseError> {
    let data = data.ok_or_else(|| EventParseError(format!("{event_type}: missing data.object")))?;
    serde_json::from_value(data.object).map_err(|e| EventParseError(format!("{event_type}: {e}")))
}

fn require_intent(reference: Option<String>, event_type: &str) -> Result<String, EventParseError> {
    reference
        .filter(|r| !r.is_empty())
        .ok_or_else(|| EventParseError(format!("{event_type}: missing payment_intent")))
}

impl ProcessorEvent {
    /// Parses a verified webhook body.
    ///
    /// # Errors
    ///
    /// Fails if the body is not JSON, the event id is blank, or a handled
    /// event type lacks the fields it needs.
    pub fn parse(payload: &[u8]) -> Result<Self, EventParseError> {
        let raw: RawEvent = serde_json::from_slice(payload).map_err(|e| EventParseError(e.to_string()))?;
        if raw.id.trim().is_empty() {
            return Err(EventParseError("missing event id".to_string()));
        }
        let event_type = raw.event_type.clone();

        let kind = match event_type.as_str() {
            "payment_intent.succeeded" => EventKind::PaymentSucceeded {
                payment_reference: object::<PaymentIntentObject>(raw.data, &event_type)?.id,
            },
            "payment_intent.payment_failed" => EventKind::PaymentFailed {
                payment_reference: object::<PaymentIntentObject>(raw.data, &event_type)?.id,
            },
            "charge.refunded" => {
                let charge: ChargeObject = object(raw.data, &event_type)?;
                EventKind::ChargeRefunded {
                    payment_reference: require_intent(charge.payment_intent, &event_type)?,
                    refunds: charge
                        .refunds
                        .map(|list| list.data)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|r| RefundUpdate {
                            reference_id: r.id,
                            status: r.status,
                        })
                        .collect(),
                }
            }
            "charge.dispute.created" => {
                let dispute: DisputeObject = object(raw.data, &event_type)?;
                EventKind::DisputeCreated {
                    payment_reference: require_intent(dispute.payment_intent, &event_type)?,
                    dispute_id: dispute.id,
                    reason: dispute.reason,
                }
            }
            _ => EventKind::Unhandled {
                event_type: event_type.clone(),
            },
        };

        Ok(Self {
            id: raw.id,
            event_type,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<ProcessorEvent, EventParseError> {
        ProcessorEvent::parse(value.to_string().as_bytes())
    }

    #[test]
    fn test_payment_intent_events() {
        let event = parse(json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_1", "status": "succeeded" } }
        }))
        .unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(
            event.kind,
            EventKind::PaymentSucceeded {
                payment_reference: "pi_1".to_string()
            }
        );

        let failed = parse(json!({
            "id": "evt_2",
            "type": "payment_intent.payment_failed",
            "data": { "object": { "id": "pi_1" } }
        }))
        .unwrap();
        assert!(matches!(failed.kind, EventKind::PaymentFailed { .. }));
    }

    #[test]
    fn test_charge_refunded_lists_refunds() {
        let event = parse(json!({
            "id": "evt_3",
            "type": "charge.refunded",
            "data": { "object": {
                "id": "ch_1",
                "payment_intent": "pi_1",
                "refunds": { "data": [
                    { "id": "re_1", "status": "succeeded" },
                    { "id": "re_2", "status": "pending" }
                ] }
            } }
        }))
        .unwrap();

        match event.kind {
            EventKind::ChargeRefunded {
                payment_reference,
                refunds,
            } => {
                assert_eq!(payment_reference, "pi_1");
                assert_eq!(refunds.len(), 2);
                assert_eq!(refunds[1].reference_id, "re_2");
                assert_eq!(refunds[1].status, "pending");
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_dispute_created() {
        let event = parse(json!({
            "id": "evt_4",
            "type": "charge.dispute.created",
            "data": { "object": { "id": "dp_1", "payment_intent": "pi_1", "reason": "fraudulent" } }
        }))
        .unwrap();
        assert_eq!(
            event.kind,
            EventKind::DisputeCreated {
                payment_reference: "pi_1".to_string(),
                dispute_id: "dp_1".to_string(),
                reason: Some("fraudulent".to_string()),
            }
        );
    }

    #[test]
    fn test_unknown_type_is_unhandled() {
        let event = parse(json!({
            "id": "evt_5",
            "type": "customer.created",
            "data": { "object": { "id": "cus_1" } }
        }))
        .unwrap();
        assert_eq!(
            event.kind,
            EventKind::Unhandled {
                event_type: "customer.created".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(ProcessorEvent::parse(b"not json").is_err());
        assert!(parse(json!({ "type": "payment_intent.succeeded" })).is_err());
        assert!(parse(json!({ "id": "evt_6", "type": "payment_intent.succeeded" })).is_err());
        assert!(parse(json!({
            "id": "evt_7",
            "type": "charge.refunded",
            "data": { "object": { "id": "ch_1", "payment_intent": null } }
        }))
        .is_err());
    }

    #[test]
    fn test_blank_event_id_is_rejected() {
        for id in ["", "   "] {
            let err = parse(json!({
                "id": id,
                "type": "payment_intent.succeeded",
                "data": { "object": { "id": "pi_1" } }
            }))
            .unwrap_err();
            assert_eq!(err.0, "missing event id");
        }
    }
}
