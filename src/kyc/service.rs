use crate::kyc::policy::{self, KycStatus, PolicyError};
use crate::payments::types::Direction;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const VERIFICATION_VALIDITY_DAYS: i64 = 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserKycRecord {
    pub created_at: DateTime<Utc>,
    pub status: KycStatus,
}

/// Per-user verification state plus the policy checks that read it.
///
/// Counter mutations (reminders) happen under the user's entry lock in the
/// same step as the decision that triggered them, so concurrent requests
/// for one user cannot double-remind.
#[derive(Debug, Default)]
pub struct KycService {
    records: DashMap<String, UserKycRecord>,
}

impl KycService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called at account creation; starts the user unverified.
    pub fn register_user(&self, user_id: &str) {
        self.records.insert(
            user_id.to_string(),
            UserKycRecord {
                created_at: Utc::now(),
                status: KycStatus::default(),
            },
        );
        info!(user_id = %user_id, "KYC record initialized");
    }

    pub fn status_of(&self, user_id: &str) -> KycStatus {
        self.records
            .get(user_id)
            .map(|record| record.status.clone())
            .unwrap_or_default()
    }

    /// Gate a deposit or withdrawal. Runs entirely locally: blocked
    /// accounts and over-ceiling amounts are refused before any network
    /// call is considered.
    pub fn check_transaction(
        &self,
        user_id: &str,
        amount: &BigDecimal,
        direction: Direction,
    ) -> Result<(), PolicyError> {
        let status = self.status_of(user_id);
        let now = Utc::now();

        if policy::is_blocked(&status, now) {
            warn!(user_id = %user_id, "transaction refused, account restricted");
            return Err(PolicyError::AccountBlocked);
        }
        policy::can_transact(amount, direction, &status)
    }

    /// Record that the user submitted a verification packet. The document
    /// checks themselves happen in an external system; approval arrives
    /// later through [`mark_verified`].
    pub fn mark_submitted(&self, user_id: &str) -> KycStatus {
        let mut record = self
            .records
            .entry(user_id.to_string())
            .or_insert_with(|| UserKycRecord {
                created_at: Utc::now(),
                status: KycStatus::default(),
            });
        if record.status.submitted_at.is_none() {
            record.status.submitted_at = Some(Utc::now());
            info!(user_id = %user_id, "KYC packet submitted");
        }
        record.status.clone()
    }

    /// Approval decision from the external verifier: verified for one year.
    pub fn mark_verified(&self, user_id: &str) -> KycStatus {
        let mut record = self
            .records
            .entry(user_id.to_string())
            .or_insert_with(|| UserKycRecord {
                created_at: Utc::now(),
                status: KycStatus::default(),
            });
        record.status.is_verified = true;
        record.status.expiry_date = Some(Utc::now() + Duration::days(VERIFICATION_VALIDITY_DAYS));
        info!(user_id = %user_id, "KYC verified");
        record.status.clone()
    }

    pub fn is_blocked(&self, user_id: &str) -> bool {
        policy::is_blocked(&self.status_of(user_id), Utc::now())
    }

    /// Fire a verification reminder if the user is due one. The check and
    /// the counter increment run under one entry lock.
    pub fn remind_if_needed(&self, user_id: &str, now: DateTime<Utc>) -> bool {
        let Some(mut record) = self.records.get_mut(user_id) else {
            return false;
        };

        let account_age_days = (now - record.created_at).num_days();
        if !policy::should_remind(&record.status, account_age_days, now) {
            return false;
        }

        record.status.reminder_count += 1;
        info!(
            user_id = %user_id,
            reminder_count = record.status.reminder_count,
            "🔔 NOTIFICATION: verify your identity to unlock higher transaction limits"
        );
        true
    }

    /// Sweep every known user; returns how many reminders fired.
    pub fn remind_due(&self, now: DateTime<Utc>) -> usize {
        let user_ids: Vec<String> = self.records.iter().map(|r| r.key().clone()).collect();
        user_ids
            .into_iter()
            .filter(|user_id| self.remind_if_needed(user_id, now))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kyc::policy::MAX_REMINDERS;

    #[test]
    fn unknown_users_default_to_unverified() {
        let service = KycService::new();
        let status = service.status_of("nobody");
        assert!(!status.is_verified);
        assert!(status.submitted_at.is_none());
    }

    #[test]
    fn verification_unlocks_large_transactions() {
        let service = KycService::new();
        service.register_user("u1");

        let amount = BigDecimal::from(250_000);
        assert!(service
            .check_transaction("u1", &amount, Direction::Deposit)
            .is_err());

        service.mark_verified("u1");
        assert!(service
            .check_transaction("u1", &amount, Direction::Deposit)
            .is_ok());
        assert!(service.status_of("u1").expiry_date.is_some());
    }

    #[test]
    fn submission_is_recorded_once() {
        let service = KycService::new();
        service.register_user("u1");

        let first = service.mark_submitted("u1");
        let second = service.mark_submitted("u1");
        assert_eq!(first.submitted_at, second.submitted_at);
    }

    #[test]
    fn overdue_submission_blocks_transactions() {
        let service = KycService::new();
        service.register_user("u1");
        service.mark_submitted("u1");

        {
            let mut record = service.records.get_mut("u1").unwrap();
            record.status.submitted_at = Some(Utc::now() - Duration::days(6));
        }

        let amount = BigDecimal::from(10_000);
        assert_eq!(
            service.check_transaction("u1", &amount, Direction::Deposit),
            Err(PolicyError::AccountBlocked)
        );
        assert!(service.is_blocked("u1"));
    }

    #[test]
    fn reminders_fire_for_day_old_accounts_and_cap_out() {
        let service = KycService::new();
        service.register_user("u1");

        let now = Utc::now();
        assert!(!service.remind_if_needed("u1", now), "too new");

        let later = now + Duration::days(2);
        for _ in 0..MAX_REMINDERS {
            assert!(service.remind_if_needed("u1", later));
        }
        assert!(!service.remind_if_needed("u1", later), "cap reached");
        assert_eq!(service.status_of("u1").reminder_count, MAX_REMINDERS);
    }

    #[test]
    fn sweep_counts_fired_reminders() {
        let service = KycService::new();
        service.register_user("u1");
        service.register_user("u2");
        service.mark_verified("u2");

        let later = Utc::now() + Duration::days(2);
        assert_eq!(service.remind_due(later), 1);
    }
}
