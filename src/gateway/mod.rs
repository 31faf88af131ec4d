pub mod client;
pub mod events;
pub mod signature;

pub use client::{HttpGatewayClient, InitiatedPayment, PaymentGatewayClient, TransferReceipt};
pub use events::{parse_event, GatewayEventKind, PaymentEvent};
pub use signature::WebhookVerifier;

/// Header carrying the hex HMAC signature of the raw webhook body.
pub static SIGNATURE_HEADER: http::HeaderName = http::HeaderName::from_static("x-gateway-signature");
