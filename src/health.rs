//! Health check module
//! Provides liveness/readiness state for the service and its collaborators.

use crate::payments::types::ProviderName;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub uptime_secs: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
}

#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub up: bool,
    pub details: Option<String>,
}

#[derive(Clone)]
pub struct HealthChecker {
    started_at: Instant,
    configured_providers: Vec<ProviderName>,
    sms_configured: bool,
}

impl HealthChecker {
    pub fn new(configured_providers: Vec<ProviderName>, sms_configured: bool) -> Self {
        Self {
            started_at: Instant::now(),
            configured_providers,
            sms_configured,
        }
    }

    pub fn check_health(&self) -> HealthStatus {
        let mut checks = HashMap::new();

        let providers_up = !self.configured_providers.is_empty();
        checks.insert(
            "mobile_money_providers".to_string(),
            ComponentHealth {
                up: providers_up,
                details: Some(
                    self.configured_providers
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(","),
                ),
            },
        );
        checks.insert(
            "sms_gateway".to_string(),
            ComponentHealth {
                up: self.sms_configured,
                details: (!self.sms_configured)
                    .then(|| "log-only dispatch (no SMS credentials)".to_string()),
            },
        );

        let status = if providers_up && self.sms_configured {
            HealthState::Healthy
        } else {
            HealthState::Degraded
        };

        HealthStatus {
            status,
            checks,
            uptime_secs: self.started_at.elapsed().as_secs(),
            timestamp: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fully_configured_service_is_healthy() {
        let checker = HealthChecker::new(vec![ProviderName::Mtn, ProviderName::Airtel], true);
        let status = checker.check_health();
        assert_eq!(status.status, HealthState::Healthy);
    }

    #[test]
    fn missing_sms_gateway_degrades_health() {
        let checker = HealthChecker::new(vec![ProviderName::Mtn], false);
        let status = checker.check_health();
        assert_eq!(status.status, HealthState::Degraded);
        assert!(!status.checks["sms_gateway"].up);
    }
}
