use crate::money::Currency;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::{unsupported_operation, PaymentProvider};
use crate::payments::types::{
    CaptureOutcome, ChargeRequest, PaymentDetails, PaymentFlow, PaymentMethod, PushInitiation,
    PushStatus,
};
use crate::payments::utils::PaymentHttpClient;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct MobileMoneyConfig {
    pub api_key: String,
    pub base_url: String,
    /// KES per settlement-currency unit. Rate sourcing is external; this
    /// is plumbed straight into the currency conversion.
    pub exchange_rate: Decimal,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl MobileMoneyConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let api_key =
            std::env::var("MOBILE_MONEY_API_KEY").map_err(|_| PaymentError::ValidationError {
                message: "MOBILE_MONEY_API_KEY environment variable is required".to_string(),
                field: Some("MOBILE_MONEY_API_KEY".to_string()),
            })?;

        let exchange_rate_raw =
            std::env::var("MOBILE_MONEY_EXCHANGE_RATE").unwrap_or_else(|_| "130".to_string());
        let exchange_rate = Decimal::from_str(exchange_rate_raw.trim()).map_err(|_| {
            PaymentError::ValidationError {
                message: format!("invalid exchange rate '{}'", exchange_rate_raw),
                field: Some("MOBILE_MONEY_EXCHANGE_RATE".to_string()),
            }
        })?;
        if exchange_rate <= Decimal::ZERO {
            return Err(PaymentError::ValidationError {
                message: "exchange rate must be positive".to_string(),
                field: Some("MOBILE_MONEY_EXCHANGE_RATE".to_string()),
            });
        }

        Ok(Self {
            api_key,
            base_url: std::env::var("MOBILE_MONEY_BASE_URL")
                .unwrap_or_else(|_| "https://api.mobilemoney.example".to_string()),
            exchange_rate,
            timeout_secs: std::env::var("MOBILE_MONEY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("MOBILE_MONEY_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(3),
        })
    }
}

/// Mobile-money push payments. `initiate_push` fires a prompt to the
/// payer's handset and returns a reference; the outcome is observed by
/// polling, so this provider never captures synchronously.
pub struct MobileMoneyProvider {
    config: MobileMoneyConfig,
    http: PaymentHttpClient,
}

impl MobileMoneyProvider {
    pub fn new(config: MobileMoneyConfig) -> PaymentResult<Self> {
        let http =
            PaymentHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(MobileMoneyConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

#[derive(Debug, Deserialize)]
struct PushInitData {
    checkout_request_id: String,
}

#[derive(Debug, Deserialize)]
struct PushStatusData {
    status: String,
    receipt_number: Option<String>,
    failure_reason: Option<String>,
}

#[async_trait]
impl PaymentProvider for MobileMoneyProvider {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::MobileMoney
    }

    fn flow(&self) -> PaymentFlow {
        PaymentFlow::AsynchronousPush
    }

    async fn authorize_and_capture(
        &self,
        _charge: &ChargeRequest,
        _details: &PaymentDetails,
    ) -> PaymentResult<CaptureOutcome> {
        Err(unsupported_operation(self.method(), "synchronous capture"))
    }

    async fn initiate_push(
        &self,
        charge: &ChargeRequest,
        details: &PaymentDetails,
    ) -> PaymentResult<PushInitiation> {
        let PaymentDetails::MobileMoney { phone_number } = details else {
            return Err(PaymentError::ValidationError {
                message: "mobile money requires a phone number".to_string(),
                field: Some("payment_details".to_string()),
            });
        };

        let local_amount = charge
            .amount
            .convert(Currency::Kes, self.config.exchange_rate)
            .map_err(|e| PaymentError::ValidationError {
                message: format!("cannot convert charge amount: {}", e),
                field: Some("amount".to_string()),
            })?;

        let payload = serde_json::json!({
            "phone_number": phone_number,
            "amount": local_amount.to_decimal_string(),
            "currency": local_amount.currency().code(),
            "reference": charge.order_number,
            "external_id": charge.order_id,
        });

        let data: PushInitData = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/v1/push"),
                Some(&self.config.api_key),
                Some(&payload),
                &[],
            )
            .await?;

        info!(
            reference = %charge.order_number,
            checkout_request_id = %data.checkout_request_id,
            amount = %local_amount,
            "mobile money push initiated"
        );

        Ok(PushInitiation {
            provider_reference: data.checkout_request_id,
        })
    }

    async fn poll_status(&self, provider_reference: &str) -> PaymentResult<PushStatus> {
        if provider_reference.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "provider reference is required".to_string(),
                field: Some("provider_reference".to_string()),
            });
        }

        let data: PushStatusData = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/v1/push/{}", provider_reference)),
                Some(&self.config.api_key),
                None,
                &[],
            )
            .await?;

        match data.status.as_str() {
            "pending" | "processing" => Ok(PushStatus::Pending),
            "success" => {
                let receipt =
                    data.receipt_number
                        .filter(|v| !v.is_empty())
                        .ok_or(PaymentError::Provider {
                            provider: "mobile_money".to_string(),
                            message: "successful push without a receipt number".to_string(),
                            provider_code: None,
                            retryable: false,
                        })?;
                Ok(PushStatus::Succeeded {
                    provider_transaction_id: receipt,
                })
            }
            "failed" | "cancelled" | "timeout" => Ok(PushStatus::Failed {
                reason: data
                    .failure_reason
                    .unwrap_or_else(|| "push request was not completed".to_string()),
            }),
            other => Err(PaymentError::Provider {
                provider: "mobile_money".to_string(),
                message: format!("unexpected push status '{}'", other),
                provider_code: None,
                retryable: false,
            }),
        }
    }
}
