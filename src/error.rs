//! Unified application error surface
//!
//! Module-level errors (phone, OTP, policy, payments, registration) carry
//! the detail; this module folds them into one `AppError` with a
//! machine-readable code, an HTTP status, a user-facing message and a
//! retryability flag for the API layer.

use crate::kyc::PolicyError;
use crate::otp::OtpError;
use crate::payments::error::PaymentError;
use crate::phone::PhoneError;
use crate::services::registration::RegistrationError;
use crate::services::transaction_form::TransactionFormError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "INVALID_PHONE")]
    InvalidPhone,
    #[serde(rename = "RATE_LIMITED")]
    RateLimited,
    #[serde(rename = "OTP_NOT_FOUND")]
    OtpNotFound,
    #[serde(rename = "OTP_EXPIRED")]
    OtpExpired,
    #[serde(rename = "OTP_EXHAUSTED")]
    OtpExhausted,
    #[serde(rename = "TRANSPORT_ERROR")]
    TransportError,
    #[serde(rename = "PROVIDER_REJECTED")]
    ProviderRejected,
    #[serde(rename = "TIMEOUT")]
    Timeout,
    #[serde(rename = "POLICY_LIMIT_EXCEEDED")]
    PolicyLimitExceeded,
    #[serde(rename = "ACCOUNT_BLOCKED")]
    AccountBlocked,
    #[serde(rename = "TRANSACTION_NOT_FOUND")]
    TransactionNotFound,
    #[serde(rename = "CALLBACK_REJECTED")]
    CallbackRejected,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Phone(PhoneError),
    Otp(OtpError),
    Policy(PolicyError),
    Payment(PaymentError),
    Registration(RegistrationError),
    Validation { message: String },
    Internal { message: String },
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation {
            message: message.into(),
        })
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Internal {
            message: message.into(),
        })
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Phone(_) => ErrorCode::InvalidPhone,
            AppErrorKind::Otp(e) => match e {
                OtpError::RateLimited { .. } => ErrorCode::RateLimited,
                OtpError::NotFound => ErrorCode::OtpNotFound,
                OtpError::Expired => ErrorCode::OtpExpired,
                OtpError::Exhausted => ErrorCode::OtpExhausted,
                OtpError::CodeMismatch { .. } => ErrorCode::ValidationError,
                OtpError::Delivery { .. } => ErrorCode::TransportError,
            },
            AppErrorKind::Policy(e) => match e {
                PolicyError::LimitExceeded { .. } => ErrorCode::PolicyLimitExceeded,
                PolicyError::AccountBlocked => ErrorCode::AccountBlocked,
            },
            AppErrorKind::Payment(e) => match e {
                PaymentError::Validation { .. } => ErrorCode::ValidationError,
                PaymentError::Transport { .. } => ErrorCode::TransportError,
                PaymentError::Timeout { .. } => ErrorCode::Timeout,
                PaymentError::RateLimited { .. } => ErrorCode::RateLimited,
                PaymentError::ProviderRejected { .. } => ErrorCode::ProviderRejected,
                PaymentError::NotFound { .. } => ErrorCode::TransactionNotFound,
                PaymentError::CallbackVerification { .. } => ErrorCode::CallbackRejected,
            },
            AppErrorKind::Registration(e) => match e {
                RegistrationError::Phone(_) => ErrorCode::InvalidPhone,
                RegistrationError::InvalidField { .. } => ErrorCode::ValidationError,
                RegistrationError::Otp(inner) => {
                    AppError::new(AppErrorKind::Otp(inner.clone())).error_code()
                }
                RegistrationError::AccountCreation { .. } => ErrorCode::TransportError,
                RegistrationError::NoActiveFlow => ErrorCode::OtpNotFound,
            },
            AppErrorKind::Validation { .. } => ErrorCode::ValidationError,
            AppErrorKind::Internal { .. } => ErrorCode::InternalError,
        }
    }

    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Phone(_) => 400,
            AppErrorKind::Otp(e) => match e {
                OtpError::RateLimited { .. } => 429,
                OtpError::NotFound => 404,
                OtpError::Expired => 400,
                OtpError::Exhausted => 400,
                OtpError::CodeMismatch { .. } => 400,
                OtpError::Delivery { .. } => 502,
            },
            AppErrorKind::Policy(_) => 403,
            AppErrorKind::Payment(e) => e.http_status_code(),
            AppErrorKind::Registration(e) => match e {
                RegistrationError::Phone(_) => 400,
                RegistrationError::InvalidField { .. } => 400,
                RegistrationError::Otp(inner) => {
                    AppError::new(AppErrorKind::Otp(inner.clone())).status_code()
                }
                RegistrationError::AccountCreation { .. } => 502,
                RegistrationError::NoActiveFlow => 404,
            },
            AppErrorKind::Validation { .. } => 400,
            AppErrorKind::Internal { .. } => 500,
        }
    }

    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Phone(_) => "Please enter a valid Ugandan phone number".to_string(),
            AppErrorKind::Otp(e) => match e {
                OtpError::RateLimited { retry_after_secs } => {
                    format!("Too many requests. Please wait {retry_after_secs}s and try again.")
                }
                OtpError::NotFound => {
                    "No active verification code. Please request a new one.".to_string()
                }
                OtpError::Expired => {
                    "The verification code has expired. Please resend the code.".to_string()
                }
                OtpError::Exhausted => {
                    "Too many incorrect attempts. Please resend the code.".to_string()
                }
                OtpError::CodeMismatch { attempts_remaining } => {
                    format!("Incorrect code. {attempts_remaining} attempt(s) remaining.")
                }
                OtpError::Delivery { .. } => {
                    "We could not send the verification code. Please try again.".to_string()
                }
            },
            AppErrorKind::Policy(e) => e.to_string(),
            AppErrorKind::Payment(e) => e.user_message(),
            AppErrorKind::Registration(e) => match e {
                RegistrationError::Phone(_) => {
                    "Please enter a valid Ugandan phone number".to_string()
                }
                RegistrationError::InvalidField { message, .. } => message.clone(),
                RegistrationError::Otp(inner) => {
                    AppError::new(AppErrorKind::Otp(inner.clone())).user_message()
                }
                RegistrationError::AccountCreation { .. } => {
                    "Failed to create your account. Please try again.".to_string()
                }
                RegistrationError::NoActiveFlow => {
                    "No registration in progress for this number.".to_string()
                }
            },
            AppErrorKind::Validation { message } => message.clone(),
            AppErrorKind::Internal { .. } => {
                "An internal error occurred. Please try again later.".to_string()
            }
        }
    }

    /// Whether the client may safely retry the same request.
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Phone(_) => false,
            AppErrorKind::Otp(e) => matches!(e, OtpError::Delivery { retryable: true, .. }),
            AppErrorKind::Policy(_) => false,
            AppErrorKind::Payment(e) => e.is_retryable(),
            AppErrorKind::Registration(e) => match e {
                RegistrationError::Otp(OtpError::Delivery { retryable, .. }) => *retryable,
                RegistrationError::AccountCreation { retryable, .. } => *retryable,
                _ => false,
            },
            AppErrorKind::Validation { .. } => false,
            AppErrorKind::Internal { .. } => false,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            AppErrorKind::Phone(e) => write!(f, "{e}"),
            AppErrorKind::Otp(e) => write!(f, "{e}"),
            AppErrorKind::Policy(e) => write!(f, "{e}"),
            AppErrorKind::Payment(e) => write!(f, "{e}"),
            AppErrorKind::Registration(e) => write!(f, "{e}"),
            AppErrorKind::Validation { message } => write!(f, "validation error: {message}"),
            AppErrorKind::Internal { message } => write!(f, "internal error: {message}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<PhoneError> for AppError {
    fn from(e: PhoneError) -> Self {
        AppError::new(AppErrorKind::Phone(e))
    }
}

impl From<OtpError> for AppError {
    fn from(e: OtpError) -> Self {
        AppError::new(AppErrorKind::Otp(e))
    }
}

impl From<PolicyError> for AppError {
    fn from(e: PolicyError) -> Self {
        AppError::new(AppErrorKind::Policy(e))
    }
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        AppError::new(AppErrorKind::Payment(e))
    }
}

impl From<RegistrationError> for AppError {
    fn from(e: RegistrationError) -> Self {
        AppError::new(AppErrorKind::Registration(e))
    }
}

impl From<TransactionFormError> for AppError {
    fn from(e: TransactionFormError) -> Self {
        match e {
            TransactionFormError::Phone(inner) => AppError::new(AppErrorKind::Phone(inner)),
            TransactionFormError::Policy(inner) => AppError::new(AppErrorKind::Policy(inner)),
            TransactionFormError::Payment(inner) => AppError::new(AppErrorKind::Payment(inner)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::Direction;

    #[test]
    fn policy_rejections_carry_the_ceiling_in_the_message() {
        let err: AppError = PolicyError::LimitExceeded {
            direction: Direction::Withdrawal,
            ceiling_ugx: 50_000,
        }
        .into();
        assert_eq!(err.error_code(), ErrorCode::PolicyLimitExceeded);
        assert_eq!(err.status_code(), 403);
        assert!(err.user_message().contains("50000"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn transport_and_timeout_offer_a_retry() {
        let transport: AppError = PaymentError::Transport {
            message: "reset".to_string(),
        }
        .into();
        assert!(transport.is_retryable());
        assert_eq!(transport.status_code(), 503);

        let timeout: AppError = PaymentError::Timeout {
            message: "slow".to_string(),
            timeout_secs: 15,
        }
        .into();
        assert!(timeout.is_retryable());
        assert_eq!(timeout.status_code(), 504);
    }

    #[test]
    fn otp_errors_map_to_distinct_codes() {
        let cases = [
            (OtpError::NotFound, ErrorCode::OtpNotFound, 404),
            (OtpError::Expired, ErrorCode::OtpExpired, 400),
            (OtpError::Exhausted, ErrorCode::OtpExhausted, 400),
            (
                OtpError::RateLimited {
                    retry_after_secs: 30,
                },
                ErrorCode::RateLimited,
                429,
            ),
        ];
        for (otp_err, code, status) in cases {
            let err: AppError = otp_err.into();
            assert_eq!(err.error_code(), code);
            assert_eq!(err.status_code(), status);
        }
    }

    #[test]
    fn nested_registration_otp_errors_keep_their_mapping() {
        let err: AppError = RegistrationError::Otp(OtpError::Exhausted).into();
        assert_eq!(err.error_code(), ErrorCode::OtpExhausted);
        assert_eq!(err.status_code(), 400);
    }
}
