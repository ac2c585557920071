use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("request timed out after {timeout_secs}s: {message}")]
    Timeout { message: String, timeout_secs: u64 },

    #[error("rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("provider {provider} rejected the request: {message}")]
    ProviderRejected {
        provider: String,
        message: String,
        provider_code: Option<String>,
    },

    #[error("transaction {reference} not found")]
    NotFound { reference: String },

    #[error("callback verification failed: {message}")]
    CallbackVerification { message: String },
}

impl PaymentError {
    /// Whether an automatic retry against the same reference is safe.
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Validation { .. } => false,
            PaymentError::Transport { .. } => true,
            PaymentError::Timeout { .. } => true,
            PaymentError::RateLimited { .. } => false,
            PaymentError::ProviderRejected { .. } => false,
            PaymentError::NotFound { .. } => false,
            PaymentError::CallbackVerification { .. } => false,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::Validation { .. } => 400,
            PaymentError::Transport { .. } => 503,
            PaymentError::Timeout { .. } => 504,
            PaymentError::RateLimited { .. } => 429,
            PaymentError::ProviderRejected { .. } => 402,
            PaymentError::NotFound { .. } => 404,
            PaymentError::CallbackVerification { .. } => 401,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentError::Validation { message, .. } => message.clone(),
            PaymentError::Transport { .. } => {
                "Mobile money provider is temporarily unreachable. Please try again.".to_string()
            }
            PaymentError::Timeout { .. } => {
                "The provider did not respond in time. Please try again.".to_string()
            }
            PaymentError::RateLimited {
                retry_after_secs, ..
            } => match retry_after_secs {
                Some(secs) => format!("Too many requests. Please wait {secs}s and try again."),
                None => "Too many requests. Please try again later.".to_string(),
            },
            PaymentError::ProviderRejected { message, .. } => {
                format!("The payment was declined: {message}")
            }
            PaymentError::NotFound { reference } => {
                format!("No transaction found for reference {reference}")
            }
            PaymentError::CallbackVerification { .. } => "Invalid callback signature".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_and_timeout_are_retryable() {
        assert!(PaymentError::Transport {
            message: "connection reset".to_string()
        }
        .is_retryable());
        assert!(PaymentError::Timeout {
            message: "requesttopay".to_string(),
            timeout_secs: 15
        }
        .is_retryable());

        assert!(!PaymentError::ProviderRejected {
            provider: "airtel".to_string(),
            message: "declined".to_string(),
            provider_code: None
        }
        .is_retryable());
        assert!(!PaymentError::RateLimited {
            message: "limited".to_string(),
            retry_after_secs: Some(30)
        }
        .is_retryable());
    }

    #[test]
    fn http_status_mapping_distinguishes_failure_kinds() {
        assert_eq!(
            PaymentError::Transport {
                message: "x".to_string()
            }
            .http_status_code(),
            503
        );
        assert_eq!(
            PaymentError::Timeout {
                message: "x".to_string(),
                timeout_secs: 30
            }
            .http_status_code(),
            504
        );
        assert_eq!(
            PaymentError::ProviderRejected {
                provider: "mtn".to_string(),
                message: "x".to_string(),
                provider_code: Some("PAYER_LIMIT_REACHED".to_string())
            }
            .http_status_code(),
            402
        );
    }
}
