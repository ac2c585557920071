//! Application configuration
//! Environment-variable loading and validation for the service wiring.

use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub throttle: ThrottleConfig,
    pub rates: RatesConfig,
    pub registration: RegistrationConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    pub window_secs: u64,
    pub ceiling: usize,
}

#[derive(Debug, Clone)]
pub struct RatesConfig {
    /// Upstream `{buy, sell}` endpoint; fixed fallback rates when unset.
    pub upstream_url: Option<String>,
    pub cache_ttl_secs: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    /// Hosted registration endpoint; accepted locally when unset (dev).
    pub upstream_url: Option<String>,
    pub timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            throttle: ThrottleConfig::from_env()?,
            rates: RatesConfig::from_env()?,
            registration: RegistrationConfig::from_env()?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.throttle.validate()?;
        self.rates.validate()?;
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

impl ThrottleConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ThrottleConfig {
            window_secs: env::var("THROTTLE_WINDOW_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("THROTTLE_WINDOW_SECS".to_string()))?,
            ceiling: env::var("THROTTLE_CEILING")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("THROTTLE_CEILING".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "THROTTLE_WINDOW_SECS cannot be 0".to_string(),
            ));
        }
        if self.ceiling == 0 {
            return Err(ConfigError::InvalidValue(
                "THROTTLE_CEILING cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl RatesConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(RatesConfig {
            upstream_url: env::var("RATES_UPSTREAM_URL").ok(),
            cache_ttl_secs: env::var("RATES_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("RATES_CACHE_TTL_SECS".to_string()))?,
            timeout_secs: env::var("RATES_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("RATES_TIMEOUT_SECS".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.upstream_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(
                    "RATES_UPSTREAM_URL must be a valid URL".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl RegistrationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(RegistrationConfig {
            upstream_url: env::var("REGISTRATION_UPSTREAM_URL").ok(),
            timeout_secs: env::var("REGISTRATION_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("REGISTRATION_TIMEOUT_SECS".to_string()))?,
        })
    }
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

    #[test]
    fn default_server_config_is_valid() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_port_is_rejected() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_throttle_ceiling_is_rejected() {
        let config = ThrottleConfig {
            window_secs: 60,
            ceiling: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rates_upstream_must_be_a_url() {
        let config = RatesConfig {
            upstream_url: Some("not-a-url".to_string()),
            cache_ttl_secs: 60,
            timeout_secs: 5,
        };
        assert!(config.validate().is_err());
    }
}
