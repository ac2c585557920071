//! End-to-end deposit/withdrawal scenarios: KYC-tiered limits enforced
//! locally before any provider traffic, gateway classification surfaced
//! unchanged, and status polling semantics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ugxchange_backend::kyc::{KycService, PolicyError};
use ugxchange_backend::payments::error::{PaymentError, PaymentResult};
use ugxchange_backend::payments::gateway::{GatewayConfig, MobileMoneyGateway};
use ugxchange_backend::payments::provider::MobileMoneyProvider;
use ugxchange_backend::payments::store::TransactionStore;
use ugxchange_backend::payments::types::{
    CallbackEvent, CollectionRequest, Direction, DisbursementRequest, InitiationResponse,
    ProviderName, StatusResponse, TransactionStatus,
};
use ugxchange_backend::services::transaction_form::{
    TransactionFormError, TransactionFormService, TransactionSubmission,
};
use ugxchange_backend::throttle::RequestThrottle;

struct CountingProvider {
    name: ProviderName,
    calls: AtomicUsize,
}

impl CountingProvider {
    fn new(name: ProviderName) -> Self {
        Self {
            name,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MobileMoneyProvider for CountingProvider {
    async fn request_collection(
        &self,
        request: CollectionRequest,
    ) -> PaymentResult<InitiationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(InitiationResponse {
            status: TransactionStatus::Pending,
            reference: request.reference,
            provider_transaction_id: None,
            message: None,
        })
    }

    async fn request_disbursement(
        &self,
        request: DisbursementRequest,
    ) -> PaymentResult<InitiationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(InitiationResponse {
            status: TransactionStatus::Pending,
            reference: request.reference,
            provider_transaction_id: None,
            message: None,
        })
    }

    async fn fetch_status(
        &self,
        reference: &str,
        _direction: Direction,
    ) -> PaymentResult<StatusResponse> {
        Ok(StatusResponse {
            status: TransactionStatus::Success,
            reference: reference.to_string(),
            provider_transaction_id: Some("fin_1".to_string()),
            message: None,
        })
    }

    fn name(&self) -> ProviderName {
        self.name
    }

    fn verify_callback(&self, _payload: &[u8], _signature: &str) -> PaymentResult<()> {
        Err(PaymentError::CallbackVerification {
            message: "not used in this test".to_string(),
        })
    }

    fn parse_callback(&self, _payload: &[u8]) -> PaymentResult<CallbackEvent> {
        Err(PaymentError::CallbackVerification {
            message: "not used in this test".to_string(),
        })
    }
}

struct Harness {
    service: TransactionFormService,
    gateway: Arc<MobileMoneyGateway>,
    kyc: Arc<KycService>,
    mtn: Arc<CountingProvider>,
    airtel: Arc<CountingProvider>,
}

fn harness() -> Harness {
    let mtn = Arc::new(CountingProvider::new(ProviderName::Mtn));
    let airtel = Arc::new(CountingProvider::new(ProviderName::Airtel));
    let gateway = Arc::new(MobileMoneyGateway::new(
        vec![
            Arc::clone(&mtn) as Arc<dyn MobileMoneyProvider>,
            Arc::clone(&airtel) as Arc<dyn MobileMoneyProvider>,
        ],
        Arc::new(TransactionStore::new()),
        Arc::new(RequestThrottle::new()),
        GatewayConfig {
            retry_base_delay: Duration::from_millis(1),
            ..GatewayConfig::default()
        },
    ));
    let kyc = Arc::new(KycService::new());
    kyc.register_user("user-1");

    let service = TransactionFormService::new(Arc::clone(&kyc), Arc::clone(&gateway));
    Harness {
        service,
        gateway,
        kyc,
        mtn,
        airtel,
    }
}

fn submission(amount: &str, provider: ProviderName) -> TransactionSubmission {
    TransactionSubmission {
        user_id: "user-1".to_string(),
        amount: amount.to_string(),
        phone_number: "0771234567".to_string(),
        provider,
    }
}

#[tokio::test]
async fn unverified_withdrawal_over_the_ceiling_never_reaches_the_gateway() {
    let h = harness();

    let err = h
        .service
        .submit_withdrawal(submission("60000", ProviderName::Mtn))
        .await
        .unwrap_err();

    match err {
        TransactionFormError::Policy(PolicyError::LimitExceeded {
            direction,
            ceiling_ugx,
        }) => {
            assert_eq!(direction, Direction::Withdrawal);
            assert_eq!(ceiling_ugx, 50_000);
        }
        other => panic!("unexpected error {other:?}"),
    }

    assert_eq!(h.mtn.calls(), 0, "policy rejection must stay local");
    assert_eq!(h.airtel.calls(), 0);
}

#[tokio::test]
async fn unverified_deposit_over_the_ceiling_is_rejected_locally() {
    let h = harness();

    let err = h
        .service
        .submit_deposit(submission("250000", ProviderName::Mtn))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransactionFormError::Policy(PolicyError::LimitExceeded { .. })
    ));
    assert_eq!(h.mtn.calls(), 0);
}

#[tokio::test]
async fn verification_lifts_the_ceiling_and_the_gateway_is_called() {
    let h = harness();
    h.kyc.mark_verified("user-1");

    let outcome = h
        .service
        .submit_deposit(submission("250000", ProviderName::Mtn))
        .await
        .unwrap();

    assert!(outcome.reference.starts_with("TX"));
    assert_eq!(outcome.status, TransactionStatus::Pending);
    assert_eq!(h.mtn.calls(), 1);
}

#[tokio::test]
async fn small_deposits_pass_without_verification() {
    let h = harness();

    let outcome = h
        .service
        .submit_deposit(submission("10000", ProviderName::Airtel))
        .await
        .unwrap();

    assert_eq!(h.airtel.calls(), 1);
    assert_eq!(h.mtn.calls(), 0, "dispatch must honor the selected provider");

    let stored = h.gateway.transaction(&outcome.reference).unwrap();
    assert_eq!(stored.provider, ProviderName::Airtel);
    assert_eq!(stored.phone.as_str(), "+256771234567");
    assert_eq!(stored.direction, Direction::Deposit);
}

#[tokio::test]
async fn a_fresh_submission_does_not_restrict_the_account() {
    let h = harness();
    h.kyc.mark_submitted("user-1");

    // Inside the grace window the account transacts normally.
    h.service
        .submit_deposit(submission("10000", ProviderName::Mtn))
        .await
        .unwrap();
    assert_eq!(h.mtn.calls(), 1);
    assert!(!h.kyc.is_blocked("user-1"));
}

#[tokio::test]
async fn invalid_phone_is_rejected_before_policy_or_network() {
    let h = harness();

    let bad = TransactionSubmission {
        phone_number: "12345".to_string(),
        ..submission("10000", ProviderName::Mtn)
    };
    let err = h.service.submit_deposit(bad).await.unwrap_err();
    assert!(matches!(err, TransactionFormError::Phone(_)));
    assert_eq!(h.mtn.calls(), 0);
}

#[tokio::test]
async fn status_polling_resolves_a_pending_transaction() {
    let h = harness();

    let outcome = h
        .service
        .submit_deposit(submission("10000", ProviderName::Mtn))
        .await
        .unwrap();
    assert_eq!(outcome.status, TransactionStatus::Pending);

    let polled = h.gateway.poll_status(&outcome.reference).await.unwrap();
    assert_eq!(polled.status, TransactionStatus::Success);
    assert_eq!(
        h.gateway.transaction(&outcome.reference).unwrap().status,
        TransactionStatus::Success
    );
}

#[tokio::test]
async fn withdrawal_within_the_unverified_ceiling_goes_through() {
    let h = harness();

    let outcome = h
        .service
        .submit_withdrawal(submission("50000", ProviderName::Mtn))
        .await
        .unwrap();

    assert!(outcome.reference.starts_with("WDR"));
    assert_eq!(h.mtn.calls(), 1);
}
