//! Business orchestration on top of the OTP, KYC and payments subsystems

pub mod exchange_rate;
pub mod registration;
pub mod transaction_form;

pub use exchange_rate::{ExchangeRateService, RateProvider, UsdtRates};
pub use registration::{
    AccountCreator, ProfileSubmission, RegistrationDraft, RegistrationError, RegistrationService,
    RegistrationStage,
};
pub use transaction_form::{TransactionFormError, TransactionFormService, TransactionSubmission};
