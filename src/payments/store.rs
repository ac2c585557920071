//! In-memory transaction store
//!
//! The gateway is the single writer of transaction status; everything else
//! reads through it. Status only moves away from `Pending` on a concrete
//! provider answer (poll result or verified callback).

use crate::payments::types::{Direction, Money, ProviderName, TransactionStatus};
use crate::phone::PhoneNumber;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobileMoneyTransaction {
    pub reference: String,
    pub phone: PhoneNumber,
    pub amount: Money,
    pub provider: ProviderName,
    pub direction: Direction,
    pub status: TransactionStatus,
    pub provider_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct TransactionStore {
    transactions: DashMap<String, MobileMoneyTransaction>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, transaction: MobileMoneyTransaction) {
        self.transactions
            .insert(transaction.reference.clone(), transaction);
    }

    pub fn get(&self, reference: &str) -> Option<MobileMoneyTransaction> {
        self.transactions.get(reference).map(|tx| tx.clone())
    }

    /// Apply a provider-confirmed status. Terminal states are sticky; a
    /// late `Pending` or `Unknown` never overwrites a confirmed outcome.
    pub fn apply_status(
        &self,
        reference: &str,
        status: TransactionStatus,
        provider_transaction_id: Option<String>,
    ) -> Option<MobileMoneyTransaction> {
        let mut entry = self.transactions.get_mut(reference)?;
        if !entry.status.is_terminal() && status != TransactionStatus::Unknown {
            entry.status = status;
            entry.updated_at = Utc::now();
        }
        if let Some(id) = provider_transaction_id {
            entry.provider_transaction_id = Some(id);
        }
        Some(entry.clone())
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction(reference: &str, status: TransactionStatus) -> MobileMoneyTransaction {
        MobileMoneyTransaction {
            reference: reference.to_string(),
            phone: PhoneNumber::normalize("0771234567").unwrap(),
            amount: Money::ugx("10000"),
            provider: ProviderName::Mtn,
            direction: Direction::Deposit,
            status,
            provider_transaction_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn apply_status_updates_pending_transactions() {
        let store = TransactionStore::new();
        store.insert(transaction("TX1", TransactionStatus::Pending));

        let updated = store
            .apply_status("TX1", TransactionStatus::Success, Some("MP123".to_string()))
            .unwrap();
        assert_eq!(updated.status, TransactionStatus::Success);
        assert_eq!(updated.provider_transaction_id.as_deref(), Some("MP123"));
    }

    #[test]
    fn terminal_status_is_sticky() {
        let store = TransactionStore::new();
        store.insert(transaction("TX1", TransactionStatus::Success));

        let after = store
            .apply_status("TX1", TransactionStatus::Failed, None)
            .unwrap();
        assert_eq!(after.status, TransactionStatus::Success);
    }

    #[test]
    fn unknown_never_overwrites_a_stored_status() {
        let store = TransactionStore::new();
        store.insert(transaction("TX1", TransactionStatus::Pending));

        let after = store
            .apply_status("TX1", TransactionStatus::Unknown, None)
            .unwrap();
        assert_eq!(after.status, TransactionStatus::Pending);
    }

    #[test]
    fn missing_reference_returns_none() {
        let store = TransactionStore::new();
        assert!(store.apply_status("nope", TransactionStatus::Success, None).is_none());
    }
}
