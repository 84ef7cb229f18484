pub mod policymodel;
pub mod referralmodel;
pub mod rewardmodel;
