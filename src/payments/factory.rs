use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::MobileMoneyProvider;
use crate::payments::providers::{AirtelProvider, MtnProvider};
use crate::payments::types::ProviderName;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ProviderFactoryConfig {
    pub enabled_providers: Vec<ProviderName>,
}

impl Default for ProviderFactoryConfig {
    fn default() -> Self {
        Self {
            enabled_providers: vec![ProviderName::Mtn, ProviderName::Airtel],
        }
    }
}

impl ProviderFactoryConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let enabled_raw = std::env::var("ENABLED_MOBILE_MONEY_PROVIDERS")
            .unwrap_or_else(|_| "mtn,airtel".to_string());

        let mut enabled_providers = Vec::new();
        for part in enabled_raw.split(',') {
            let value = part.trim();
            if value.is_empty() {
                continue;
            }
            enabled_providers.push(ProviderName::from_str(value)?);
        }

        if enabled_providers.is_empty() {
            return Err(PaymentError::Validation {
                message: "at least one mobile money provider must be enabled".to_string(),
                field: Some("ENABLED_MOBILE_MONEY_PROVIDERS".to_string()),
            });
        }

        Ok(Self { enabled_providers })
    }
}

/// Builds provider adapters from environment credentials.
///
/// New providers plug in as new adapters behind [`MobileMoneyProvider`];
/// this match is the only place that knows the concrete types.
pub struct ProviderFactory {
    config: ProviderFactoryConfig,
}

impl ProviderFactory {
    pub fn from_env() -> PaymentResult<Self> {
        Ok(Self {
            config: ProviderFactoryConfig::from_env()?,
        })
    }

    pub fn with_config(config: ProviderFactoryConfig) -> Self {
        Self { config }
    }

    pub fn enabled_providers(&self) -> &[ProviderName] {
        &self.config.enabled_providers
    }

    pub fn get_provider(
        &self,
        provider: ProviderName,
    ) -> PaymentResult<Arc<dyn MobileMoneyProvider>> {
        if !self.config.enabled_providers.contains(&provider) {
            return Err(PaymentError::Validation {
                message: format!("provider {} is disabled", provider),
                field: Some("provider".to_string()),
            });
        }

        match provider {
            ProviderName::Mtn => Ok(Arc::new(MtnProvider::from_env()?)),
            ProviderName::Airtel => Ok(Arc::new(AirtelProvider::from_env()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_provider_is_refused() {
        let factory = ProviderFactory::with_config(ProviderFactoryConfig {
            enabled_providers: vec![ProviderName::Airtel],
        });
        let err = match factory.get_provider(ProviderName::Mtn) {
            Ok(_) => panic!("expected get_provider to fail for disabled provider"),
            Err(e) => e,
        };
        assert!(matches!(err, PaymentError::Validation { .. }));
    }

    #[test]
    fn default_config_enables_both_providers() {
        let config = ProviderFactoryConfig::default();
        assert_eq!(config.enabled_providers.len(), 2);
        assert!(config.enabled_providers.contains(&ProviderName::Mtn));
        assert!(config.enabled_providers.contains(&ProviderName::Airtel));
    }
}
