//! Application configuration.
//!
//! Everything is loaded from environment variables (with `.env` support)
//! and validated once at startup. Settlement knobs (tax rate, withdrawal
//! fee, minimum withdrawal, default commission) live here so the services
//! never reach for `std::env` themselves.

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

use crate::money::{Currency, Money};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub settlement: SettlementConfig,
    pub store_backend: StoreBackend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_secs: u64,
}

/// Marketplace settlement parameters.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Currency the ledger and all orders are denominated in.
    pub currency: Currency,
    /// Sales tax applied on the order subtotal, in percent.
    pub tax_rate_percent: Decimal,
    /// Platform fee on withdrawals, in percent of the withdrawn amount.
    pub withdrawal_fee_percent: Decimal,
    /// Smallest withdrawal a designer may request.
    pub minimum_withdrawal: Money,
    /// Commission a designer earns on a sale when their profile does not
    /// override it, in percent.
    pub default_commission_percent: Decimal,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv().ok();

        let config = AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            settlement: SettlementConfig::from_env()?,
            store_backend: match env::var("STORE_BACKEND")
                .unwrap_or_else(|_| "postgres".to_string())
                .to_lowercase()
                .as_str()
            {
                "memory" => StoreBackend::Memory,
                "postgres" => StoreBackend::Postgres,
                other => {
                    return Err(ConfigError::InvalidValue(format!(
                        "STORE_BACKEND '{}' (expected 'postgres' or 'memory')",
                        other
                    )))
                }
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.settlement.validate()?;
        if self.store_backend == StoreBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::MissingVariable("DATABASE_URL".to_string()));
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("PORT cannot be 0".to_string()));
        }
        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue("HOST cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL").ok(),
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout_secs: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
        })
    }
}

impl SettlementConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let currency = Currency::from_str(
            &env::var("SETTLEMENT_CURRENCY").unwrap_or_else(|_| "USD".to_string()),
        )
        .map_err(|_| ConfigError::InvalidValue("SETTLEMENT_CURRENCY".to_string()))?;

        let tax_rate_percent = parse_percent("TAX_RATE_PERCENT", "8")?;
        let withdrawal_fee_percent = parse_percent("WITHDRAWAL_FEE_PERCENT", "2.5")?;
        let default_commission_percent = parse_percent("DEFAULT_COMMISSION_PERCENT", "70")?;

        let minimum_withdrawal = Money::parse(
            &env::var("MINIMUM_WITHDRAWAL").unwrap_or_else(|_| "25.00".to_string()),
            currency,
        )
        .map_err(|_| ConfigError::InvalidValue("MINIMUM_WITHDRAWAL".to_string()))?;

        Ok(SettlementConfig {
            currency,
            tax_rate_percent,
            withdrawal_fee_percent,
            minimum_withdrawal,
            default_commission_percent,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tax_rate_percent >= Decimal::from(100) {
            return Err(ConfigError::InvalidValue(
                "TAX_RATE_PERCENT must be below 100".to_string(),
            ));
        }
        if self.withdrawal_fee_percent >= Decimal::from(100) {
            return Err(ConfigError::InvalidValue(
                "WITHDRAWAL_FEE_PERCENT must be below 100".to_string(),
            ));
        }
        if self.default_commission_percent > Decimal::from(100) {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_COMMISSION_PERCENT must not exceed 100".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_percent(var: &str, default: &str) -> Result<Decimal, ConfigError> {
    let raw = env::var(var).unwrap_or_else(|_| default.to_string());
    let value =
        Decimal::from_str(raw.trim()).map_err(|_| ConfigError::InvalidValue(var.to_string()))?;
    if value.is_sign_negative() {
        return Err(ConfigError::InvalidValue(format!(
            "{} cannot be negative",
            var
        )));
    }
    Ok(value)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settlement_defaults() -> SettlementConfig {
        SettlementConfig {
            currency: Currency::Usd,
            tax_rate_percent: Decimal::from(8),
            withdrawal_fee_percent: Decimal::from_str("2.5").unwrap(),
            minimum_withdrawal: Money::parse("25.00", Currency::Usd).unwrap(),
            default_commission_percent: Decimal::from(70),
        }
    }

    #[test]
    fn default_settlement_config_validates() {
        assert!(settlement_defaults().validate().is_ok());
    }

    #[test]
    fn commission_above_100_is_rejected() {
        let mut config = settlement_defaults();
        config.default_commission_percent = Decimal::from(101);
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_port_is_rejected() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        assert!(config.validate().is_err());
    }
}
