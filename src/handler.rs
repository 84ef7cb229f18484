pub mod admin;
pub mod referral;
