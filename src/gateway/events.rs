use crate::error::{AppError, Result};
use crate::models::PaymentPurpose;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Settlement event kinds this engine handles. Anything else the gateway
/// sends is acknowledged and dropped at the parse boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayEventKind {
    ChargeSucceeded,
    TransferSucceeded,
    TransferFailed,
    TransferReversed,
}

impl GatewayEventKind {
    /// Maps the gateway's dotted event names onto the typed kind.
    pub fn from_wire(event: &str) -> Result<Self> {
        match event {
            "charge.success" => Ok(GatewayEventKind::ChargeSucceeded),
            "transfer.success" => Ok(GatewayEventKind::TransferSucceeded),
            "transfer.failed" => Ok(GatewayEventKind::TransferFailed),
            "transfer.reversed" => Ok(GatewayEventKind::TransferReversed),
            other => Err(AppError::Parse(format!("unhandled event kind '{}'", other))),
        }
    }
}

/// Normalized, trusted settlement event handed to the reconciliation engine.
/// Produced only after signature verification and envelope validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub kind: GatewayEventKind,
    pub reference: String,
    pub amount: Decimal,
    pub customer_email: Option<String>,
    pub purpose: Option<PaymentPurpose>,
    pub related_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

/// Raw wire envelope: `{event, data: {reference, amount, customer, metadata}}`.
#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    reference: String,
    amount: Decimal,
    #[serde(default)]
    customer: Option<WebhookCustomer>,
    #[serde(default)]
    metadata: Option<WebhookMetadata>,
}

#[derive(Debug, Deserialize)]
struct WebhookCustomer {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookMetadata {
    #[serde(default)]
    purpose: Option<PaymentPurpose>,
    #[serde(default)]
    related_id: Option<Uuid>,
    #[serde(default)]
    user_id: Option<Uuid>,
}

/// Parses and normalizes a verified webhook body.
///
/// Malformed JSON, unknown event kinds and unknown purpose strings all fail
/// closed as `Parse` errors; the caller acknowledges them without applying
/// anything.
pub fn parse_event(raw_body: &[u8]) -> Result<PaymentEvent> {
    let envelope: WebhookEnvelope = serde_json::from_slice(raw_body)
        .map_err(|e| AppError::Parse(format!("invalid webhook envelope: {}", e)))?;

    let kind = GatewayEventKind::from_wire(&envelope.event)?;

    if envelope.data.reference.trim().is_empty() {
        return Err(AppError::Parse("event carries an empty reference".to_string()));
    }
    if envelope.data.amount <= Decimal::ZERO {
        return Err(AppError::Parse(format!(
            "event amount must be positive, got {}",
            envelope.data.amount
        )));
    }

    let metadata = envelope.data.metadata;
    Ok(PaymentEvent {
        kind,
        reference: envelope.data.reference,
        amount: envelope.data.amount,
        customer_email: envelope.data.customer.and_then(|c| c.email),
        purpose: metadata.as_ref().and_then(|m| m.purpose),
        related_id: metadata.as_ref().and_then(|m| m.related_id),
        user_id: metadata.as_ref().and_then(|m| m.user_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_charge_success() {
        let user_id = Uuid::new_v4();
        let related_id = Uuid::new_v4();
        let body = serde_json::json!({
            "event": "charge.success",
            "data": {
                "reference": "INS-abc123",
                "amount": "5000",
                "customer": {"email": "buyer@example.com"},
                "metadata": {
                    "purpose": "inspection-payment",
                    "related_id": related_id,
                    "user_id": user_id
                }
            }
        });

        let event = parse_event(body.to_string().as_bytes()).unwrap();
        assert_eq!(event.kind, GatewayEventKind::ChargeSucceeded);
        assert_eq!(event.reference, "INS-abc123");
        assert_eq!(event.amount, dec!(5000));
        assert_eq!(event.customer_email.as_deref(), Some("buyer@example.com"));
        assert_eq!(event.purpose, Some(PaymentPurpose::InspectionPayment));
        assert_eq!(event.related_id, Some(related_id));
        assert_eq!(event.user_id, Some(user_id));
    }

    #[test]
    fn test_parse_transfer_events() {
        for (wire, kind) in [
            ("transfer.success", GatewayEventKind::TransferSucceeded),
            ("transfer.failed", GatewayEventKind::TransferFailed),
            ("transfer.reversed", GatewayEventKind::TransferReversed),
        ] {
            let body = serde_json::json!({
                "event": wire,
                "data": {"reference": "WTH-1", "amount": "2500"}
            });
            let event = parse_event(body.to_string().as_bytes()).unwrap();
            assert_eq!(event.kind, kind);
            assert!(event.purpose.is_none());
        }
    }

    #[test]
    fn test_unknown_event_kind_fails_closed() {
        let body = serde_json::json!({
            "event": "invoice.create",
            "data": {"reference": "INV-1", "amount": "100"}
        });
        let err = parse_event(body.to_string().as_bytes()).unwrap_err();
        match err {
            AppError::Parse(msg) => assert!(msg.contains("invoice.create")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_purpose_fails_closed() {
        let body = serde_json::json!({
            "event": "charge.success",
            "data": {
                "reference": "REF-1",
                "amount": "100",
                "metadata": {"purpose": "loyalty-cashback"}
            }
        });
        assert!(matches!(
            parse_event(body.to_string().as_bytes()),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            parse_event(b"{\"event\": \"charge.success\""),
            Err(AppError::Parse(_))
        ));
        assert!(matches!(parse_event(b"not json"), Err(AppError::Parse(_))));
    }

    #[test]
    fn test_empty_reference_rejected() {
        let body = serde_json::json!({
            "event": "charge.success",
            "data": {"reference": "  ", "amount": "100"}
        });
        assert!(matches!(
            parse_event(body.to_string().as_bytes()),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let body = serde_json::json!({
            "event": "charge.success",
            "data": {"reference": "REF-1", "amount": "0"}
        });
        assert!(matches!(
            parse_event(body.to_string().as_bytes()),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn test_metadata_is_optional() {
        let body = serde_json::json!({
            "event": "transfer.success",
            "data": {"reference": "WTH-9", "amount": "2500"}
        });
        let event = parse_event(body.to_string().as_bytes()).unwrap();
        assert!(event.purpose.is_none());
        assert!(event.user_id.is_none());
        assert!(event.customer_email.is_none());
    }
}
