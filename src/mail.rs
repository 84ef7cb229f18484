pub mod mails;
pub mod notifier;
pub mod sendmail;
