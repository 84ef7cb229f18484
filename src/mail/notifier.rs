use async_trait::async_trait;

use super::{
    mails::{render_reward_email, RewardEmailParams},
    sendmail::{send_email, OutgoingEmail},
};
use crate::config::Config;

/// Delivers the reward mail. Reports success as a bool; a failed delivery
/// never undoes an issued reward.
#[async_trait]
pub trait RewardNotifier: Send + Sync {
    async fn send(&self, destination: &str, subject: &str, params: &RewardEmailParams) -> bool;
}

pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(api_key: String, sender_name: &str, sender_email: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from: format!("{} <{}>", sender_name, sender_email),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.resend_api_key.clone(),
            &config.sender_name,
            &config.sender_email,
        )
    }
}

#[async_trait]
impl RewardNotifier for ResendMailer {
    async fn send(&self, destination: &str, subject: &str, params: &RewardEmailParams) -> bool {
        let html = render_reward_email(params);

        let result = send_email(
            &self.client,
            &self.api_key,
            OutgoingEmail {
                from: &self.from,
                to: destination,
                subject,
                html: &html,
            },
        )
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    "Failed to deliver {} reward mail to {}: {}",
                    params.tier.to_str(),
                    destination,
                    e
                );
                false
            }
        }
    }
}
