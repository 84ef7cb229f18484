pub mod code_generator;
pub mod error;
pub mod event_validator;
pub mod policy;
pub mod referral_service;
