//! Provider-facing types.
//!
//! Payment details are a tagged union over the supported methods; each
//! variant carries the fixed field schema for its provider and is
//! validated here, before any adapter is invoked. A missing or malformed
//! field fails fast and never reaches the provider.

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::money::Money;
use crate::payments::error::{PaymentError, PaymentResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Paypal,
    MobileMoney,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::MobileMoney => "mobile_money",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "card" => Ok(PaymentMethod::Card),
            "paypal" => Ok(PaymentMethod::Paypal),
            "mobile_money" | "mobile-money" => Ok(PaymentMethod::MobileMoney),
            _ => Err(PaymentError::ValidationError {
                message: format!("unsupported payment method: {}", value),
                field: Some("payment_method".to_string()),
            }),
        }
    }
}

/// How a provider confirms payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentFlow {
    /// A single authorize-and-capture call settles the payment.
    Synchronous,
    /// The provider pushes a prompt to the payer; the result is observed
    /// by polling with the returned reference.
    AsynchronousPush,
}

/// Method-specific payment input, validated against its schema before the
/// adapter sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentDetails {
    Card {
        card_number: String,
        expiry_month: u8,
        expiry_year: u16,
        cvv: String,
        cardholder_name: String,
    },
    Paypal {
        email: String,
    },
    MobileMoney {
        phone_number: String,
    },
}

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"));
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{9,15}$").expect("static regex"));
static DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("static regex"));

fn invalid(field: &str, message: impl Into<String>) -> PaymentError {
    PaymentError::ValidationError {
        message: message.into(),
        field: Some(field.to_string()),
    }
}

fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    for (i, ch) in digits.chars().rev().enumerate() {
        let Some(mut d) = ch.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}

impl PaymentDetails {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentDetails::Card { .. } => PaymentMethod::Card,
            PaymentDetails::Paypal { .. } => PaymentMethod::Paypal,
            PaymentDetails::MobileMoney { .. } => PaymentMethod::MobileMoney,
        }
    }

    /// Validate the payload against its provider schema.
    pub fn validate(&self) -> PaymentResult<()> {
        match self {
            PaymentDetails::Card {
                card_number,
                expiry_month,
                expiry_year,
                cvv,
                cardholder_name,
            } => {
                let number = card_number.trim();
                if !DIGITS_RE.is_match(number) || !(12..=19).contains(&number.len()) {
                    return Err(invalid("card_number", "must be 12-19 digits"));
                }
                if !luhn_valid(number) {
                    return Err(invalid("card_number", "failed checksum"));
                }
                if !(1..=12).contains(expiry_month) {
                    return Err(invalid("expiry_month", "must be between 1 and 12"));
                }
                let now = Utc::now();
                let (year, month) = (now.year() as u16, now.month() as u8);
                if *expiry_year < year || (*expiry_year == year && *expiry_month < month) {
                    return Err(invalid("expiry_year", "card is expired"));
                }
                if !DIGITS_RE.is_match(cvv) || !(3..=4).contains(&cvv.len()) {
                    return Err(invalid("cvv", "must be 3 or 4 digits"));
                }
                if cardholder_name.trim().is_empty() {
                    return Err(invalid("cardholder_name", "is required"));
                }
                Ok(())
            }
            PaymentDetails::Paypal { email } => {
                if !EMAIL_RE.is_match(email.trim()) {
                    return Err(invalid("email", "must be a valid email address"));
                }
                Ok(())
            }
            PaymentDetails::MobileMoney { phone_number } => {
                if !PHONE_RE.is_match(phone_number.trim()) {
                    return Err(invalid(
                        "phone_number",
                        "must be 9-15 digits, optionally prefixed with +",
                    ));
                }
                Ok(())
            }
        }
    }
}

/// What the orchestrator hands an adapter: a read-only snapshot of the
/// charge. Adapters never see the order aggregate or the ledger.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub order_id: Uuid,
    pub order_number: String,
    pub buyer_id: Uuid,
    pub amount: Money,
}

/// Successful synchronous capture.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub provider_transaction_id: String,
}

/// Accepted push request; poll with the reference.
#[derive(Debug, Clone)]
pub struct PushInitiation {
    pub provider_reference: String,
}

/// Observed state of a push payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushStatus {
    Pending,
    Succeeded { provider_transaction_id: String },
    Failed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(number: &str, month: u8, year: u16, cvv: &str, name: &str) -> PaymentDetails {
        PaymentDetails::Card {
            card_number: number.to_string(),
            expiry_month: month,
            expiry_year: year,
            cvv: cvv.to_string(),
            cardholder_name: name.to_string(),
        }
    }

    #[test]
    fn valid_card_passes_schema() {
        assert!(card("4242424242424242", 12, 2030, "123", "Ada Lovelace")
            .validate()
            .is_ok());
    }

    #[test]
    fn card_schema_rejects_bad_fields() {
        // too short
        assert!(card("1234", 12, 2030, "123", "Ada").validate().is_err());
        // fails checksum
        assert!(card("4242424242424243", 12, 2030, "123", "Ada")
            .validate()
            .is_err());
        // expired
        assert!(card("4242424242424242", 12, 2020, "123", "Ada")
            .validate()
            .is_err());
        // bad cvv
        assert!(card("4242424242424242", 12, 2030, "12", "Ada")
            .validate()
            .is_err());
        // missing name
        assert!(card("4242424242424242", 12, 2030, "123", " ")
            .validate()
            .is_err());
    }

    #[test]
    fn paypal_schema_requires_valid_email() {
        assert!(PaymentDetails::Paypal {
            email: "designer@example.com".to_string()
        }
        .validate()
        .is_ok());
        assert!(PaymentDetails::Paypal {
            email: "not-an-email".to_string()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn mobile_money_schema_requires_phone() {
        assert!(PaymentDetails::MobileMoney {
            phone_number: "+254712345678".to_string()
        }
        .validate()
        .is_ok());
        assert!(PaymentDetails::MobileMoney {
            phone_number: "call-me".to_string()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn details_deserialize_by_method_tag() {
        let payload = serde_json::json!({
            "method": "mobile_money",
            "phone_number": "+254712345678"
        });
        let parsed: PaymentDetails =
            serde_json::from_value(payload).expect("deserialization should succeed");
        assert_eq!(parsed.method(), PaymentMethod::MobileMoney);

        let unknown = serde_json::json!({ "method": "cheque", "number": "1" });
        assert!(serde_json::from_value::<PaymentDetails>(unknown).is_err());
    }
}
