use crate::config::GatewaySettings;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Result of initializing a checkout with the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatedPayment {
    pub reference: String,
    /// Hosted checkout page the customer is redirected to.
    pub authorization_url: String,
}

/// Acknowledgement of an accepted payout transfer. The terminal outcome
/// arrives later as a transfer webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub reference: String,
    pub transfer_code: String,
}

/// Outbound port to the payment gateway. The HTTP implementation talks to
/// the real provider; tests substitute a stub.
#[async_trait]
pub trait PaymentGatewayClient: Send + Sync {
    /// Registers a checkout for `amount` under `reference` and returns the
    /// customer-facing authorization URL.
    async fn initialize_payment(
        &self,
        reference: &str,
        amount: Decimal,
        email: &str,
        metadata: serde_json::Value,
    ) -> Result<InitiatedPayment>;

    /// Initiates a payout transfer to a previously registered recipient.
    async fn initiate_transfer(
        &self,
        reference: &str,
        amount: Decimal,
        recipient: &str,
        narration: &str,
    ) -> Result<TransferReceipt>;
}

/// Gateway client over HTTPS with bearer authentication.
pub struct HttpGatewayClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    callback_url: String,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct TransferData {
    transfer_code: String,
    reference: String,
}

impl HttpGatewayClient {
    pub fn new(settings: &GatewaySettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            secret_key: settings.secret_key.clone(),
            callback_url: settings.callback_url.clone(),
        }
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("request to {} failed: {}", path, e)))?;

        let status = response.status();
        let parsed: GatewayResponse<T> = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("invalid response from {}: {}", path, e)))?;

        if !status.is_success() || !parsed.status {
            return Err(AppError::Gateway(format!(
                "{} returned {}: {}",
                path, status, parsed.message
            )));
        }
        parsed
            .data
            .ok_or_else(|| AppError::Gateway(format!("{} returned no data", path)))
    }
}

#[async_trait]
impl PaymentGatewayClient for HttpGatewayClient {
    async fn initialize_payment(
        &self,
        reference: &str,
        amount: Decimal,
        email: &str,
        metadata: serde_json::Value,
    ) -> Result<InitiatedPayment> {
        let body = serde_json::json!({
            "reference": reference,
            "amount": amount,
            "email": email,
            "callback_url": self.callback_url,
            "metadata": metadata,
        });
        let data: InitializeData = self.post("/transaction/initialize", &body).await?;
        Ok(InitiatedPayment {
            reference: data.reference,
            authorization_url: data.authorization_url,
        })
    }

    async fn initiate_transfer(
        &self,
        reference: &str,
        amount: Decimal,
        recipient: &str,
        narration: &str,
    ) -> Result<TransferReceipt> {
        let body = serde_json::json!({
            "source": "balance",
            "reference": reference,
            "amount": amount,
            "recipient": recipient,
            "reason": narration,
        });
        let data: TransferData = self.post("/transfer", &body).await?;
        Ok(TransferReceipt {
            reference: data.reference,
            transfer_code: data.transfer_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_response_deserialization() {
        let json = r#"{
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": "https://checkout.example.com/abc",
                "reference": "FND-123"
            }
        }"#;
        let parsed: GatewayResponse<InitializeData> = serde_json::from_str(json).unwrap();
        assert!(parsed.status);
        let data = parsed.data.unwrap();
        assert_eq!(data.reference, "FND-123");
        assert!(data.authorization_url.starts_with("https://"));
    }

    #[test]
    fn test_error_response_deserialization() {
        let json = r#"{"status": false, "message": "Invalid key", "data": null}"#;
        let parsed: GatewayResponse<TransferData> = serde_json::from_str(json).unwrap();
        assert!(!parsed.status);
        assert!(parsed.data.is_none());
        assert_eq!(parsed.message, "Invalid key");
    }
}
