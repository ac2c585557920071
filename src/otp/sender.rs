use crate::phone::PhoneNumber;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Error)]
#[error("failed to dispatch verification code: {message}")]
pub struct DispatchError {
    pub message: String,
    pub retryable: bool,
}

/// Outbound SMS collaborator. The service never tells the sender anything
/// beyond the destination and the code body.
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send_code(&self, phone: &PhoneNumber, code: &str) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone)]
pub struct SmsGatewayConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl SmsGatewayConfig {
    pub fn from_env() -> Option<Self> {
        let account_sid = std::env::var("SMS_ACCOUNT_SID").ok()?;
        let auth_token = std::env::var("SMS_AUTH_TOKEN").ok()?;
        let from_number = std::env::var("SMS_FROM_NUMBER").ok()?;
        Some(Self {
            account_sid,
            auth_token,
            from_number,
            base_url: std::env::var("SMS_BASE_URL")
                .unwrap_or_else(|_| "https://api.twilio.com".to_string()),
            timeout_secs: std::env::var("SMS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
        })
    }
}

/// Twilio-style SMS sender: basic-auth form post to the messages endpoint.
pub struct SmsGatewaySender {
    config: SmsGatewayConfig,
    client: reqwest::Client,
}

impl SmsGatewaySender {
    pub fn new(config: SmsGatewayConfig) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DispatchError {
                message: format!("failed to initialize SMS client: {}", e),
                retryable: false,
            })?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl OtpSender for SmsGatewaySender {
    async fn send_code(&self, phone: &PhoneNumber, code: &str) -> Result<(), DispatchError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.base_url, self.config.account_sid
        );

        let mut form: HashMap<&str, String> = HashMap::new();
        form.insert("To", phone.as_str().to_string());
        form.insert("From", self.config.from_number.clone());
        form.insert("Body", format!("Your UGXchange verification code is {code}"));

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| DispatchError {
                message: format!("SMS gateway request failed: {}", e),
                retryable: true,
            })?;

        let status = response.status();
        if status.is_success() {
            info!(phone = %phone, "verification code dispatched");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(phone = %phone, status = %status, "SMS gateway error");
        Err(DispatchError {
            message: format!("SMS gateway returned {status}: {body}"),
            retryable: status.is_server_error(),
        })
    }
}

/// Development fallback when no SMS credentials are configured. Logs the
/// dispatch without the code body.
#[derive(Debug, Default)]
pub struct LogOnlySender;

#[async_trait]
impl OtpSender for LogOnlySender {
    async fn send_code(&self, phone: &PhoneNumber, _code: &str) -> Result<(), DispatchError> {
        info!(phone = %phone, "verification code dispatch skipped (no SMS gateway configured)");
        Ok(())
    }
}
