pub mod kyc_reminder;
