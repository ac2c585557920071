use crate::phone::PhoneNumber;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// A live passcode challenge for one phone number.
///
/// At most one challenge exists per phone at a time; a resend replaces the
/// previous challenge, invalidating its code.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub phone: PhoneNumber,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub resend_available_at: DateTime<Utc>,
    pub attempts_remaining: u32,
}

/// Injected challenge store. Entry access serializes per phone, so two
/// concurrent verifies for the same number cannot interleave their
/// read-modify-write.
#[derive(Debug, Default)]
pub struct OtpStore {
    challenges: DashMap<PhoneNumber, OtpChallenge>,
}

impl OtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, challenge: OtpChallenge) {
        self.challenges.insert(challenge.phone.clone(), challenge);
    }

    pub fn remove(&self, phone: &PhoneNumber) -> Option<OtpChallenge> {
        self.challenges.remove(phone).map(|(_, challenge)| challenge)
    }

    pub fn get(&self, phone: &PhoneNumber) -> Option<OtpChallenge> {
        self.challenges.get(phone).map(|entry| entry.clone())
    }

    /// Run `f` against the live challenge for `phone` under the entry lock.
    ///
    /// `f` decides the verdict and whether the challenge survives; returning
    /// `false` for `keep` removes it atomically with the decision.
    pub fn with_entry<R>(
        &self,
        phone: &PhoneNumber,
        f: impl FnOnce(Option<&mut OtpChallenge>) -> (R, bool),
    ) -> R {
        match self.challenges.entry(phone.clone()) {
            Entry::Vacant(_) => f(None).0,
            Entry::Occupied(mut occupied) => {
                let (result, keep) = f(Some(occupied.get_mut()));
                if !keep {
                    occupied.remove();
                }
                result
            }
        }
    }

    /// Install a fresh challenge unless the existing one is still inside
    /// its resend cooldown. Replacement invalidates the previous code.
    /// Returns the remaining cooldown on refusal.
    pub fn replace_after_cooldown(
        &self,
        challenge: OtpChallenge,
        now: DateTime<Utc>,
    ) -> Result<(), chrono::Duration> {
        match self.challenges.entry(challenge.phone.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(challenge);
                Ok(())
            }
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get();
                if now < existing.resend_available_at {
                    Err(existing.resend_available_at - now)
                } else {
                    occupied.insert(challenge);
                    Ok(())
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}
