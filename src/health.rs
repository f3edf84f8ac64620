//! Service health checks.

use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: &'static str,
    pub state: HealthState,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub components: Vec<ComponentHealth>,
    pub timestamp: String,
}

#[derive(Clone)]
pub struct HealthChecker {
    pool: Option<PgPool>,
}

impl HealthChecker {
    pub fn new(pool: Option<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn check_health(&self) -> HealthStatus {
        let mut components = Vec::new();

        match &self.pool {
            Some(pool) => match crate::database::health_check(pool).await {
                Ok(()) => components.push(ComponentHealth {
                    name: "database",
                    state: HealthState::Healthy,
                    detail: None,
                }),
                Err(e) => components.push(ComponentHealth {
                    name: "database",
                    state: HealthState::Unhealthy,
                    detail: Some(e.to_string()),
                }),
            },
            None => components.push(ComponentHealth {
                name: "store",
                state: HealthState::Healthy,
                detail: Some("in-memory backend".to_string()),
            }),
        }

        let status = if components
            .iter()
            .any(|c| c.state == HealthState::Unhealthy)
        {
            HealthState::Unhealthy
        } else {
            HealthState::Healthy
        };

        HealthStatus {
            status,
            components,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
