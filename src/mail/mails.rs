use chrono::{DateTime, Utc};

use crate::models::rewardmodel::RewardTier;

const REWARD_TEMPLATE: &str = include_str!("templates/reward-email.html");
const CUSTOM_REWARD_TEMPLATE: &str = include_str!("templates/custom-reward-email.html");

/// What the referee's mail needs; the processor decides these, the
/// templates only lay them out.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardEmailParams {
    pub tier: RewardTier,
    pub code: String,
    pub apply_url: String,
    pub discount_text: String,
    pub expiry_date: Option<String>,
    pub referrer_email: String,
}

pub fn format_expiry_date(expires_at: DateTime<Utc>) -> String {
    expires_at.format("%B %-d, %Y").to_string()
}

pub fn render_reward_email(params: &RewardEmailParams) -> String {
    let template = match params.tier {
        RewardTier::Custom => CUSTOM_REWARD_TEMPLATE,
        RewardTier::Standard | RewardTier::Enhanced => REWARD_TEMPLATE,
    };

    let tier_banner = if params.tier == RewardTier::Enhanced {
        r#"<tr><td style="color: #327bb5; font-size: 15px; padding-top: 10px;">Your friend is one of our top ambassadors, so you get an upgraded reward.</td></tr>"#.to_string()
    } else {
        String::new()
    };

    let expiry_line = match params.expiry_date.as_deref() {
        Some(date) if params.tier != RewardTier::Custom => format!(
            r#"<tr><td align="center" style="color: #17284D; font-size: 13px; padding-top: 15px;">Valid until: {}</td></tr>"#,
            escape(date)
        ),
        _ => String::new(),
    };

    let placeholders = vec![
        ("{{tier_banner}}".to_string(), tier_banner),
        ("{{expiry_line}}".to_string(), expiry_line),
        ("{{code}}".to_string(), escape(&params.code)),
        ("{{apply_url}}".to_string(), escape(&params.apply_url)),
        ("{{discount_text}}".to_string(), escape(&params.discount_text)),
        ("{{referrer_email}}".to_string(), escape(&params.referrer_email)),
    ];

    let mut html = template.to_string();
    for (key, value) in &placeholders {
        html = html.replace(key, value);
    }
    html
}

fn escape(value: &str) -> String {
    ammonia::clean_text(value)
}
