//! Registration orchestration
//!
//! Drives the multi-step flow: collect profile → send OTP → verify OTP →
//! create account. The draft lives only in this service's memory and is
//! consumed by account creation or discarded by `back()`; nothing is
//! persisted before the phone number is verified.

use crate::kyc::KycService;
use crate::otp::{OtpError, OtpIssued, OtpService};
use crate::phone::{PhoneError, PhoneNumber};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use regex::Regex;
use std::sync::Arc;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{info, warn};

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct ProfileSubmission {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub terms_accepted: bool,
}

#[derive(Debug, Clone)]
pub struct RegistrationDraft {
    pub full_name: String,
    pub email: String,
    pub phone: PhoneNumber,
    pub password: String,
}

/// Explicit flow state. Transitions:
/// `Collecting → OtpSent → Verified → AccountCreated`, with `back()`
/// returning any pre-creation state to `Collecting` (flow removed).
/// `Verified` exists so a failed account-creation call can be retried
/// without demanding a fresh passcode.
#[derive(Debug, Clone)]
enum RegistrationState {
    OtpSent {
        draft: RegistrationDraft,
        sent_at: DateTime<Utc>,
    },
    Verified {
        draft: RegistrationDraft,
    },
    AccountCreated {
        email: String,
    },
}

/// Externally visible stage of a flow, for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStage {
    Collecting,
    OtpSent,
    Verified,
    AccountCreated,
}

#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Phone(#[from] PhoneError),

    #[error("invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error("account creation failed: {message}")]
    AccountCreation { message: String, retryable: bool },

    #[error("no registration in progress for this number")]
    NoActiveFlow,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AccountCreationError {
    pub message: String,
    pub retryable: bool,
}

/// Hosted registration collaborator; the HTTP implementation lives in the
/// API wiring, tests inject a mock.
#[async_trait]
pub trait AccountCreator: Send + Sync {
    async fn create_account(&self, draft: &RegistrationDraft) -> Result<(), AccountCreationError>;
}

pub struct RegistrationService {
    flows: DashMap<PhoneNumber, RegistrationState>,
    otp: Arc<OtpService>,
    accounts: Arc<dyn AccountCreator>,
    kyc: Arc<KycService>,
}

impl RegistrationService {
    pub fn new(
        otp: Arc<OtpService>,
        accounts: Arc<dyn AccountCreator>,
        kyc: Arc<KycService>,
    ) -> Self {
        Self {
            flows: DashMap::new(),
            otp,
            accounts,
            kyc,
        }
    }

    /// Validate the profile and send the verification code. On any failure
    /// the flow stays in `Collecting` (no state is recorded) so the user
    /// can correct and resubmit.
    pub async fn submit_profile(
        &self,
        submission: ProfileSubmission,
    ) -> Result<(PhoneNumber, OtpIssued), RegistrationError> {
        let draft = validate_submission(submission)?;
        let phone = draft.phone.clone();

        let issued = self.otp.send(&phone).await?;

        self.flows.insert(
            phone.clone(),
            RegistrationState::OtpSent {
                draft,
                sent_at: Utc::now(),
            },
        );
        info!(phone = %phone, "registration profile accepted, OTP sent");
        Ok((phone, issued))
    }

    /// Verify the candidate code and create the account. A code failure
    /// leaves the flow in `OtpSent` with the attempt count surfaced; an
    /// account-creation failure leaves it in `Verified` so a retry skips
    /// straight to creation.
    pub async fn verify(&self, phone: &PhoneNumber, code: &str) -> Result<(), RegistrationError> {
        let draft = match self.flows.get(phone).map(|state| state.clone()) {
            Some(RegistrationState::OtpSent { draft, sent_at }) => {
                self.otp.verify(phone, code)?;
                info!(
                    phone = %phone,
                    verified_after_secs = (Utc::now() - sent_at).num_seconds(),
                    "phone number verified"
                );
                self.flows.insert(
                    phone.clone(),
                    RegistrationState::Verified {
                        draft: draft.clone(),
                    },
                );
                draft
            }
            Some(RegistrationState::Verified { draft }) => draft,
            Some(RegistrationState::AccountCreated { .. }) | None => {
                return Err(RegistrationError::NoActiveFlow)
            }
        };

        match self.accounts.create_account(&draft).await {
            Ok(()) => {
                self.flows.insert(
                    phone.clone(),
                    RegistrationState::AccountCreated {
                        email: draft.email.clone(),
                    },
                );
                self.kyc.register_user(&draft.email);
                info!(phone = %phone, "account created");
                Ok(())
            }
            Err(e) => {
                warn!(phone = %phone, error = %e, "account creation failed");
                Err(RegistrationError::AccountCreation {
                    message: e.message,
                    retryable: e.retryable,
                })
            }
        }
    }

    /// Abandon the current flow: the draft and its OTP context are
    /// discarded without resending anything.
    pub fn back(&self, phone: &PhoneNumber) {
        if self.flows.remove(phone).is_some() {
            self.otp.cancel(phone);
            info!(phone = %phone, "registration flow discarded");
        }
    }

    pub fn stage_of(&self, phone: &PhoneNumber) -> RegistrationStage {
        match self.flows.get(phone).map(|state| state.clone()) {
            None => RegistrationStage::Collecting,
            Some(RegistrationState::OtpSent { .. }) => RegistrationStage::OtpSent,
            Some(RegistrationState::Verified { .. }) => RegistrationStage::Verified,
            Some(RegistrationState::AccountCreated { .. }) => RegistrationStage::AccountCreated,
        }
    }

    pub fn has_active_flow(&self, phone: &PhoneNumber) -> bool {
        !matches!(
            self.stage_of(phone),
            RegistrationStage::Collecting | RegistrationStage::AccountCreated
        )
    }
}

/// Posts the verified draft to the hosted registration endpoint.
pub struct HttpAccountCreator {
    client: reqwest::Client,
    url: String,
}

impl HttpAccountCreator {
    pub fn new(url: String, timeout: std::time::Duration) -> Result<Self, AccountCreationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AccountCreationError {
                message: format!("failed to initialize registration client: {e}"),
                retryable: false,
            })?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl AccountCreator for HttpAccountCreator {
    async fn create_account(&self, draft: &RegistrationDraft) -> Result<(), AccountCreationError> {
        let payload = serde_json::json!({
            "fullName": draft.full_name,
            "email": draft.email,
            "phone": draft.phone,
            "password": draft.password,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AccountCreationError {
                message: format!("registration request failed: {e}"),
                retryable: true,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(AccountCreationError {
            message: format!("registration upstream returned {status}: {body}"),
            retryable: status.is_server_error(),
        })
    }
}

/// Development fallback when no registration upstream is configured:
/// accepts every verified draft and logs it.
#[derive(Debug, Default)]
pub struct LocalAccountCreator;

#[async_trait]
impl AccountCreator for LocalAccountCreator {
    async fn create_account(&self, draft: &RegistrationDraft) -> Result<(), AccountCreationError> {
        info!(email = %draft.email, phone = %draft.phone, "account accepted (no upstream configured)");
        Ok(())
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern"))
}

fn validate_submission(
    submission: ProfileSubmission,
) -> Result<RegistrationDraft, RegistrationError> {
    let full_name = submission.full_name.trim().to_string();
    if full_name.chars().count() < 3 {
        return Err(RegistrationError::InvalidField {
            field: "fullName",
            message: "full name must be at least 3 characters".to_string(),
        });
    }

    let email = submission.email.trim().to_lowercase();
    if !email_pattern().is_match(&email) {
        return Err(RegistrationError::InvalidField {
            field: "email",
            message: "please enter a valid email address".to_string(),
        });
    }

    let password = submission.password;
    if password.chars().count() < 8 {
        return Err(RegistrationError::InvalidField {
            field: "password",
            message: "password must be at least 8 characters".to_string(),
        });
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(RegistrationError::InvalidField {
            field: "password",
            message: "password must contain at least one uppercase letter".to_string(),
        });
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(RegistrationError::InvalidField {
            field: "password",
            message: "password must contain at least one number".to_string(),
        });
    }
    if password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(RegistrationError::InvalidField {
            field: "password",
            message: "password must contain at least one special character".to_string(),
        });
    }

    if !submission.terms_accepted {
        return Err(RegistrationError::InvalidField {
            field: "terms",
            message: "you must accept the terms and conditions".to_string(),
        });
    }

    let phone = PhoneNumber::normalize(&submission.phone)?;

    Ok(RegistrationDraft {
        full_name,
        email,
        phone,
        password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::{LogOnlySender, OtpConfig, OtpStore};
    use crate::throttle::RequestThrottle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubCreator {
        calls: AtomicUsize,
        failures_before_success: AtomicUsize,
    }

    impl StubCreator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures_before_success: AtomicUsize::new(0),
            }
        }

        fn failing_once() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures_before_success: AtomicUsize::new(1),
            }
        }
    }

    #[async_trait]
    impl AccountCreator for StubCreator {
        async fn create_account(
            &self,
            _draft: &RegistrationDraft,
        ) -> Result<(), AccountCreationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_before_success
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
                .is_ok()
            {
                return Err(AccountCreationError {
                    message: "upstream unavailable".to_string(),
                    retryable: true,
                });
            }
            Ok(())
        }
    }

    fn submission() -> ProfileSubmission {
        ProfileSubmission {
            full_name: "Nakato Grace".to_string(),
            email: "nakato@example.com".to_string(),
            phone: "0701234567".to_string(),
            password: "Str0ng!pass".to_string(),
            terms_accepted: true,
        }
    }

    fn service(creator: Arc<StubCreator>) -> RegistrationService {
        let otp = Arc::new(OtpService::new(
            OtpConfig {
                resend_cooldown_secs: 0,
                dev_expose_code: true,
                ..OtpConfig::default()
            },
            Arc::new(OtpStore::new()),
            Arc::new(RequestThrottle::new()),
            Arc::new(LogOnlySender),
        ));
        RegistrationService::new(otp, creator, Arc::new(KycService::new()))
    }

    #[tokio::test]
    async fn happy_path_creates_the_account() {
        let creator = Arc::new(StubCreator::new());
        let service = service(Arc::clone(&creator));

        let (phone, issued) = service.submit_profile(submission()).await.unwrap();
        assert_eq!(service.stage_of(&phone), RegistrationStage::OtpSent);

        service
            .verify(&phone, &issued.dev_code.unwrap())
            .await
            .unwrap();
        assert_eq!(service.stage_of(&phone), RegistrationStage::AccountCreated);
        assert_eq!(creator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_phone_keeps_the_flow_collecting() {
        let service = service(Arc::new(StubCreator::new()));
        let bad = ProfileSubmission {
            phone: "0661234567".to_string(),
            ..submission()
        };
        let err = service.submit_profile(bad).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Phone(_)));
    }

    #[tokio::test]
    async fn weak_passwords_are_rejected() {
        let service = service(Arc::new(StubCreator::new()));
        for password in ["short1!", "nouppercase1!", "NoDigits!!", "NoSpecial11"] {
            let bad = ProfileSubmission {
                password: password.to_string(),
                ..submission()
            };
            let err = service.submit_profile(bad).await.unwrap_err();
            assert!(
                matches!(
                    err,
                    RegistrationError::InvalidField {
                        field: "password",
                        ..
                    }
                ),
                "password {password:?}"
            );
        }
    }

    #[tokio::test]
    async fn wrong_code_keeps_the_flow_in_otp_sent() {
        let service = service(Arc::new(StubCreator::new()));
        let (phone, _) = service.submit_profile(submission()).await.unwrap();

        let err = service.verify(&phone, "000000").await.unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::Otp(OtpError::CodeMismatch { .. })
        ));
        assert_eq!(service.stage_of(&phone), RegistrationStage::OtpSent);
    }

    #[tokio::test]
    async fn creation_failure_leaves_a_verified_flow_for_retry() {
        let creator = Arc::new(StubCreator::failing_once());
        let service = service(Arc::clone(&creator));

        let (phone, issued) = service.submit_profile(submission()).await.unwrap();
        let code = issued.dev_code.unwrap();

        let err = service.verify(&phone, &code).await.unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::AccountCreation {
                retryable: true,
                ..
            }
        ));
        assert_eq!(service.stage_of(&phone), RegistrationStage::Verified);

        // Retry succeeds without a fresh code (the old one was consumed).
        service.verify(&phone, "ignored").await.unwrap();
        assert_eq!(service.stage_of(&phone), RegistrationStage::AccountCreated);
        assert_eq!(creator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn back_discards_the_draft_and_the_challenge() {
        let service = service(Arc::new(StubCreator::new()));
        let (phone, issued) = service.submit_profile(submission()).await.unwrap();
        let code = issued.dev_code.unwrap();

        service.back(&phone);
        assert_eq!(service.stage_of(&phone), RegistrationStage::Collecting);

        let err = service.verify(&phone, &code).await.unwrap_err();
        assert!(matches!(err, RegistrationError::NoActiveFlow));
    }
}
