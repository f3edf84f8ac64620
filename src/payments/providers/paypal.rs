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
pub struct PaypalConfig {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl PaypalConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let client_id =
            std::env::var("PAYPAL_CLIENT_ID").map_err(|_| PaymentError::ValidationError {
                message: "PAYPAL_CLIENT_ID environment variable is required".to_string(),
                field: Some("PAYPAL_CLIENT_ID".to_string()),
            })?;
        let client_secret =
            std::env::var("PAYPAL_CLIENT_SECRET").map_err(|_| PaymentError::ValidationError {
                message: "PAYPAL_CLIENT_SECRET environment variable is required".to_string(),
                field: Some("PAYPAL_CLIENT_SECRET".to_string()),
            })?;

        Ok(Self {
            client_id,
            client_secret,
            base_url: std::env::var("PAYPAL_BASE_URL")
                .unwrap_or_else(|_| "https://api-m.paypal.com".to_string()),
            timeout_secs: std::env::var("PAYPAL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("PAYPAL_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(3),
        })
    }
}

/// Synchronous PayPal capture against a pre-approved payer.
pub struct PaypalProvider {
    config: PaypalConfig,
    http: PaymentHttpClient,
}

impl PaypalProvider {
    pub fn new(config: PaypalConfig) -> PaymentResult<Self> {
        let http =
            PaymentHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(PaypalConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

#[derive(Debug, Deserialize)]
struct PaypalCaptureData {
    status: String,
    capture_id: Option<String>,
    status_details: Option<String>,
}

#[async_trait]
impl PaymentProvider for PaypalProvider {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Paypal
    }

    fn flow(&self) -> PaymentFlow {
        PaymentFlow::Synchronous
    }

    async fn authorize_and_capture(
        &self,
        charge: &ChargeRequest,
        details: &PaymentDetails,
    ) -> PaymentResult<CaptureOutcome> {
        let PaymentDetails::Paypal { email } = details else {
            return Err(PaymentError::ValidationError {
                message: "paypal requires a payer email".to_string(),
                field: Some("payment_details".to_string()),
            });
        };

        let payload = serde_json::json!({
            "invoice_id": charge.order_number,
            "payer_email": email,
            "amount": {
                "value": charge.amount.to_decimal_string(),
                "currency_code": charge.amount.currency().code(),
            },
        });

        let data: PaypalCaptureData = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v2/payments/captures"),
                Some(&self.config.client_secret),
                Some(&payload),
                &[("PayPal-Client-Id", self.config.client_id.as_str())],
            )
            .await?;

        match data.status.as_str() {
            "COMPLETED" => {
                let capture_id =
                    data.capture_id
                        .filter(|v| !v.is_empty())
                        .ok_or(PaymentError::Provider {
                            provider: "paypal".to_string(),
                            message: "completed capture without a capture id".to_string(),
                            provider_code: None,
                            retryable: false,
                        })?;
                info!(reference = %charge.order_number, "paypal capture completed");
                Ok(CaptureOutcome {
                    provider_transaction_id: capture_id,
                })
            }
            "DECLINED" | "FAILED" => Err(PaymentError::Declined {
                message: data
                    .status_details
                    .unwrap_or_else(|| "payment declined by paypal".to_string()),
                provider_code: None,
            }),
            other => Err(PaymentError::Provider {
                provider: "paypal".to_string(),
                message: format!("unexpected capture status '{}'", other),
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
