use rust_decimal_macros::dec;
use uuid::Uuid;
use wallet_ledger::error::AppError;
use wallet_ledger::gateway::{parse_event, GatewayEventKind, WebhookVerifier};
use wallet_ledger::models::PaymentPurpose;

fn signed_body(verifier: &WebhookVerifier, body: serde_json::Value) -> (Vec<u8>, String) {
    let raw = body.to_string().into_bytes();
    let signature = verifier.sign(&raw);
    (raw, signature)
}

#[test]
fn test_verified_charge_event_round_trip() {
    let verifier = WebhookVerifier::new("whsec_test");
    let user_id = Uuid::new_v4();
    let (raw, signature) = signed_body(
        &verifier,
        serde_json::json!({
            "event": "charge.success",
            "data": {
                "reference": "FND-abc",
                "amount": "5000",
                "customer": {"email": "owner@example.com"},
                "metadata": {"purpose": "wallet-funding", "user_id": user_id}
            }
        }),
    );

    verifier.verify(&raw, &signature).unwrap();
    let event = parse_event(&raw).unwrap();
    assert_eq!(event.kind, GatewayEventKind::ChargeSucceeded);
    assert_eq!(event.amount, dec!(5000));
    assert_eq!(event.purpose, Some(PaymentPurpose::WalletFunding));
    assert_eq!(event.user_id, Some(user_id));
}

#[test]
fn test_signature_must_cover_exact_bytes() {
    let verifier = WebhookVerifier::new("whsec_test");
    let (raw, signature) = signed_body(
        &verifier,
        serde_json::json!({
            "event": "transfer.success",
            "data": {"reference": "WTH-1", "amount": "2500"}
        }),
    );

    // Same JSON with different whitespace is a different byte stream.
    let reformatted = String::from_utf8(raw).unwrap().replace(":", ": ");
    assert!(matches!(
        verifier.verify(reformatted.as_bytes(), &signature),
        Err(AppError::Signature)
    ));
}

#[test]
fn test_signed_but_malformed_payload_is_a_parse_error() {
    let verifier = WebhookVerifier::new("whsec_test");
    let raw = b"{\"event\": \"charge.success\", \"data\": {\"amount\": \"oops\"".to_vec();
    let signature = verifier.sign(&raw);

    // Authentic but unusable: verification passes, parsing fails closed.
    verifier.verify(&raw, &signature).unwrap();
    assert!(matches!(parse_event(&raw), Err(AppError::Parse(_))));
}

#[test]
fn test_unrecognized_event_kind_is_acknowledged_not_applied() {
    let raw = serde_json::json!({
        "event": "subscription.create",
        "data": {"reference": "SUB-1", "amount": "100"}
    })
    .to_string();

    match parse_event(raw.as_bytes()) {
        Err(AppError::Parse(msg)) => assert!(msg.contains("subscription.create")),
        other => panic!("unexpected: {other:?}"),
    }
}
