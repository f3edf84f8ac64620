//! Catalog collaborator.
//!
//! The settlement core never trusts cached prices: each cart line is
//! priced through this read-only interface at order-creation time, which
//! also reports the design's owner and that designer's current commission
//! rate so the split can be frozen onto the order item.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::money::{Currency, Money};

#[derive(Debug, Clone)]
pub struct DesignListing {
    pub design_id: Uuid,
    pub designer_id: Uuid,
    pub title: String,
    pub price: Money,
    pub commission_rate_percent: Decimal,
}

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("design {design_id} not found")]
    DesignNotFound { design_id: Uuid },

    #[error("catalog unavailable: {message}")]
    Unavailable { message: String },
}

impl From<CatalogError> for crate::error::AppError {
    fn from(err: CatalogError) -> Self {
        use crate::error::{AppError, AppErrorKind, DomainError, InfrastructureError};
        match err {
            CatalogError::DesignNotFound { design_id } => {
                AppError::domain(DomainError::DesignNotFound {
                    design_id: design_id.to_string(),
                })
            }
            CatalogError::Unavailable { message } => {
                AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
                    message,
                    is_retryable: true,
                }))
            }
        }
    }
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn design_listing(&self, design_id: Uuid) -> Result<DesignListing, CatalogError>;
}

/// Catalog reads backed by the marketplace database.
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DesignRow {
    id: Uuid,
    designer_id: Uuid,
    title: String,
    price_minor: i64,
    currency: String,
    commission_rate_percent: Decimal,
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn design_listing(&self, design_id: Uuid) -> Result<DesignListing, CatalogError> {
        let row = sqlx::query_as::<_, DesignRow>(
            "SELECT d.id, d.designer_id, d.title, d.price_minor, d.currency, \
             ds.commission_rate_percent \
             FROM designs d JOIN designers ds ON ds.id = d.designer_id \
             WHERE d.id = $1",
        )
        .bind(design_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CatalogError::Unavailable {
            message: e.to_string(),
        })?
        .ok_or(CatalogError::DesignNotFound { design_id })?;

        let currency = Currency::from_str(&row.currency).map_err(|e| CatalogError::Unavailable {
            message: format!("bad catalog currency: {}", e),
        })?;
        let price =
            Money::from_minor(row.price_minor, currency).map_err(|e| CatalogError::Unavailable {
                message: format!("bad catalog price: {}", e),
            })?;

        Ok(DesignListing {
            design_id: row.id,
            designer_id: row.designer_id,
            title: row.title,
            price,
            commission_rate_percent: row.commission_rate_percent,
        })
    }
}

/// Catalog for development runs and tests.
#[derive(Default)]
pub struct InMemoryCatalog {
    listings: RwLock<HashMap<Uuid, DesignListing>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, listing: DesignListing) {
        self.listings
            .write()
            .expect("catalog lock poisoned")
            .insert(listing.design_id, listing);
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn design_listing(&self, design_id: Uuid) -> Result<DesignListing, CatalogError> {
        self.listings
            .read()
            .map_err(|_| CatalogError::Unavailable {
                message: "catalog lock poisoned".to_string(),
            })?
            .get(&design_id)
            .cloned()
            .ok_or(CatalogError::DesignNotFound { design_id })
    }
}
