use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::{unsupported_operation, PaymentProvider};
use crate::payments::types::{
    CaptureOutcome, ChargeRequest, PaymentDetails, PaymentFlow, PaymentMethod, PushInitiation,
    PushStatus,
};
use crate::payments::utils::PaymentHttpClient;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct CardGatewayConfig {
    pub secret_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl CardGatewayConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let secret_key =
            std::env::var("CARD_GATEWAY_SECRET_KEY").map_err(|_| PaymentError::ValidationError {
                message: "CARD_GATEWAY_SECRET_KEY environment variable is required".to_string(),
                field: Some("CARD_GATEWAY_SECRET_KEY".to_string()),
            })?;

        Ok(Self {
            secret_key,
            base_url: std::env::var("CARD_GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.cardgateway.example".to_string()),
            timeout_secs: std::env::var("CARD_GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("CARD_GATEWAY_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(3),
        })
    }
}

/// Synchronous card processor: one charge call authorizes and captures.
pub struct CardGatewayProvider {
    config: CardGatewayConfig,
    http: PaymentHttpClient,
}

impl CardGatewayProvider {
    pub fn new(config: CardGatewayConfig) -> PaymentResult<Self> {
        let http =
            PaymentHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(CardGatewayConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

#[derive(Debug, Deserialize)]
struct CardChargeData {
    status: String,
    transaction_id: Option<String>,
    decline_reason: Option<String>,
    decline_code: Option<String>,
}

#[async_trait]
impl PaymentProvider for CardGatewayProvider {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Card
    }

    fn flow(&self) -> PaymentFlow {
        PaymentFlow::Synchronous
    }

    async fn authorize_and_capture(
        &self,
        charge: &ChargeRequest,
        details: &PaymentDetails,
    ) -> PaymentResult<CaptureOutcome> {
        let PaymentDetails::Card {
            card_number,
            expiry_month,
            expiry_year,
            cvv,
            cardholder_name,
        } = details
        else {
            return Err(PaymentError::ValidationError {
                message: "card gateway requires card details".to_string(),
                field: Some("payment_details".to_string()),
            });
        };

        let payload = serde_json::json!({
            "amount_minor": charge.amount.minor(),
            "currency": charge.amount.currency().code(),
            "reference": charge.order_number,
            "capture": true,
            "metadata": {
                "order_id": charge.order_id,
                "buyer_id": charge.buyer_id,
            },
            "card": {
                "number": card_number,
                "exp_month": expiry_month,
                "exp_year": expiry_year,
                "cvv": cvv,
                "name": cardholder_name,
            },
        });

        let data: CardChargeData = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v1/charges"),
                Some(&self.config.secret_key),
                Some(&payload),
                &[],
            )
            .await?;

        match data.status.as_str() {
            "approved" => {
                let transaction_id =
                    data.transaction_id
                        .filter(|v| !v.is_empty())
                        .ok_or(PaymentError::Provider {
                            provider: "card".to_string(),
                            message: "approved charge without a transaction id".to_string(),
                            provider_code: None,
                            retryable: false,
                        })?;
                info!(reference = %charge.order_number, "card charge captured");
                Ok(CaptureOutcome {
                    provider_transaction_id: transaction_id,
                })
            }
            "declined" => Err(PaymentError::Declined {
                message: data
                    .decline_reason
                    .unwrap_or_else(|| "card declined".to_string()),
                provider_code: data.decline_code,
            }),
            other => Err(PaymentError::Provider {
                provider: "card".to_string(),
                message: format!("unexpected charge status '{}'", other),
                provider_code: None,
                retryable: false,
            }),
        }
    }

    async fn initiate_push(
        &self,
        _charge: &ChargeRequest,
        _details: &PaymentDetails,
    ) -> PaymentResult<PushInitiation> {
        Err(unsupported_operation(self.method(), "push payments"))
    }

    async fn poll_status(&self, _provider_reference: &str) -> PaymentResult<PushStatus> {
        Err(unsupported_operation(self.method(), "status polling"))
    }
}
