use crate::payments::error::PaymentResult;
use crate::payments::types::{
    CallbackEvent, CollectionRequest, Direction, DisbursementRequest, InitiationResponse,
    ProviderName, StatusResponse,
};
use async_trait::async_trait;

/// Capability set every mobile-money provider adapter must implement.
///
/// Adapters own their provider's request shape, authentication and status
/// vocabulary; the rest of the system only ever sees normalized phones,
/// UGX amounts, our references and the shared status enum.
#[async_trait]
pub trait MobileMoneyProvider: Send + Sync {
    async fn request_collection(
        &self,
        request: CollectionRequest,
    ) -> PaymentResult<InitiationResponse>;

    async fn request_disbursement(
        &self,
        request: DisbursementRequest,
    ) -> PaymentResult<InitiationResponse>;

    async fn fetch_status(
        &self,
        reference: &str,
        direction: Direction,
    ) -> PaymentResult<StatusResponse>;

    fn name(&self) -> ProviderName;

    fn verify_callback(&self, payload: &[u8], signature: &str) -> PaymentResult<()>;

    fn parse_callback(&self, payload: &[u8]) -> PaymentResult<CallbackEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::{Money, TransactionStatus};
    use crate::phone::PhoneNumber;

    struct MockProvider;

    #[async_trait]
    impl MobileMoneyProvider for MockProvider {
        async fn request_collection(
            &self,
            request: CollectionRequest,
        ) -> PaymentResult<InitiationResponse> {
            Ok(InitiationResponse {
                status: TransactionStatus::Pending,
                reference: request.reference,
                provider_transaction_id: Some("mock_col_1".to_string()),
                message: None,
            })
        }

        async fn request_disbursement(
            &self,
            request: DisbursementRequest,
        ) -> PaymentResult<InitiationResponse> {
            Ok(InitiationResponse {
                status: TransactionStatus::Pending,
                reference: request.reference,
                provider_transaction_id: Some("mock_dis_1".to_string()),
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
                provider_transaction_id: None,
                message: None,
            })
        }

        fn name(&self) -> ProviderName {
            ProviderName::Mtn
        }

        fn verify_callback(&self, _payload: &[u8], _signature: &str) -> PaymentResult<()> {
            Ok(())
        }

        fn parse_callback(&self, payload: &[u8]) -> PaymentResult<CallbackEvent> {
            Ok(CallbackEvent {
                provider: ProviderName::Mtn,
                reference: None,
                status: Some(TransactionStatus::Success),
                payload: serde_json::from_slice(payload).unwrap_or_else(|_| serde_json::json!({})),
                received_at: chrono::Utc::now().to_rfc3339(),
            })
        }
    }

    #[tokio::test]
    async fn trait_can_be_implemented_by_mock_provider() {
        let provider: Box<dyn MobileMoneyProvider> = Box::new(MockProvider);

        let collection = provider
            .request_collection(CollectionRequest {
                amount: Money::ugx("10000"),
                phone: PhoneNumber::normalize("0771234567").unwrap(),
                reference: "TX1".to_string(),
                narration: "UGXchange deposit".to_string(),
            })
            .await
            .expect("collection should succeed");
        assert_eq!(collection.status, TransactionStatus::Pending);
        assert_eq!(collection.reference, "TX1");

        let status = provider
            .fetch_status("TX1", Direction::Deposit)
            .await
            .expect("status should succeed");
        assert_eq!(status.status, TransactionStatus::Success);
    }
}
