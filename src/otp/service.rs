use crate::otp::sender::OtpSender;
use crate::otp::store::{OtpChallenge, OtpStore};
use crate::phone::PhoneNumber;
use crate::throttle::{RequestThrottle, SEND_OTP_ENDPOINT};
use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("too many verification requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("no active verification code for this number")]
    NotFound,

    #[error("verification code has expired")]
    Expired,

    #[error("verification attempts exhausted")]
    Exhausted,

    #[error("incorrect verification code, {attempts_remaining} attempt(s) remaining")]
    CodeMismatch { attempts_remaining: u32 },

    #[error("failed to dispatch verification code: {message}")]
    Delivery { message: String, retryable: bool },
}

#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub expiry_secs: u64,
    pub resend_cooldown_secs: u64,
    pub max_attempts: u32,
    /// Development-only: return the generated code to the caller.
    pub dev_expose_code: bool,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            expiry_secs: 300,
            resend_cooldown_secs: 60,
            max_attempts: 5,
            dev_expose_code: false,
        }
    }
}

impl OtpConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            expiry_secs: std::env::var("OTP_EXPIRY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.expiry_secs),
            resend_cooldown_secs: std::env::var("OTP_RESEND_COOLDOWN_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.resend_cooldown_secs),
            max_attempts: std::env::var("OTP_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_attempts),
            dev_expose_code: std::env::var("OTP_DEV_EXPOSE_CODE")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.dev_expose_code),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OtpIssued {
    pub expires_in_secs: u64,
    pub resend_cooldown_secs: u64,
    /// Present only when `dev_expose_code` is set.
    pub dev_code: Option<String>,
}

/// Per-phone passcode state machine:
/// none → issued → verified | expired | exhausted.
///
/// A challenge is single-use: a successful verify consumes it, so replaying
/// the same code fails with `NotFound`. A resend replaces the live
/// challenge, invalidating its code, and is gated by a cooldown enforced
/// independently of the expiry window.
pub struct OtpService {
    config: OtpConfig,
    store: Arc<OtpStore>,
    throttle: Arc<RequestThrottle>,
    sender: Arc<dyn OtpSender>,
}

impl OtpService {
    pub fn new(
        config: OtpConfig,
        store: Arc<OtpStore>,
        throttle: Arc<RequestThrottle>,
        sender: Arc<dyn OtpSender>,
    ) -> Self {
        Self {
            config,
            store,
            throttle,
            sender,
        }
    }

    pub async fn send(&self, phone: &PhoneNumber) -> Result<OtpIssued, OtpError> {
        if !self.throttle.admit(SEND_OTP_ENDPOINT) {
            let retry_after_secs = self.throttle.retry_after(SEND_OTP_ENDPOINT).as_secs().max(1);
            warn!(phone = %phone, "OTP send throttled");
            return Err(OtpError::RateLimited { retry_after_secs });
        }

        let now = Utc::now();
        let code = generate_code();
        let challenge = OtpChallenge {
            phone: phone.clone(),
            code: code.clone(),
            issued_at: now,
            expires_at: now + ChronoDuration::seconds(self.config.expiry_secs as i64),
            resend_available_at: now
                + ChronoDuration::seconds(self.config.resend_cooldown_secs as i64),
            attempts_remaining: self.config.max_attempts,
        };

        if let Err(wait) = self.store.replace_after_cooldown(challenge, now) {
            let retry_after_secs = wait.num_seconds().max(1) as u64;
            return Err(OtpError::RateLimited { retry_after_secs });
        }

        if let Err(e) = self.sender.send_code(phone, &code).await {
            // Roll back so a retry starts from a clean slate.
            self.store.remove(phone);
            warn!(phone = %phone, error = %e, "OTP dispatch failed");
            return Err(OtpError::Delivery {
                message: e.message,
                retryable: e.retryable,
            });
        }

        info!(phone = %phone, "OTP issued");
        Ok(OtpIssued {
            expires_in_secs: self.config.expiry_secs,
            resend_cooldown_secs: self.config.resend_cooldown_secs,
            dev_code: self.config.dev_expose_code.then_some(code),
        })
    }

    pub fn verify(&self, phone: &PhoneNumber, candidate: &str) -> Result<(), OtpError> {
        let now = Utc::now();
        let candidate = candidate.trim();

        let result = self.store.with_entry(phone, |challenge| match challenge {
            None => (Err(OtpError::NotFound), false),
            Some(challenge) => {
                if now >= challenge.expires_at {
                    return (Err(OtpError::Expired), false);
                }
                if challenge.attempts_remaining == 0 {
                    return (Err(OtpError::Exhausted), true);
                }
                if challenge.code != candidate {
                    challenge.attempts_remaining -= 1;
                    if challenge.attempts_remaining == 0 {
                        (Err(OtpError::Exhausted), true)
                    } else {
                        (
                            Err(OtpError::CodeMismatch {
                                attempts_remaining: challenge.attempts_remaining,
                            }),
                            true,
                        )
                    }
                } else {
                    // Single use: the challenge is consumed with the success.
                    (Ok(()), false)
                }
            }
        });

        match &result {
            Ok(()) => info!(phone = %phone, "OTP verified"),
            Err(e) => warn!(phone = %phone, error = %e, "OTP verification failed"),
        }
        result
    }

    /// Drop any live challenge for the phone, e.g. when the owning flow is
    /// abandoned.
    pub fn cancel(&self, phone: &PhoneNumber) {
        self.store.remove(phone);
    }
}

fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}
