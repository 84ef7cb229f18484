use serde_json::json;
use thiserror::Error;
use tokio::time::{sleep, Duration};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 1000;
const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid email address: {0}")]
    InvalidRecipient(String),

    #[error("RESEND_API_KEY is empty")]
    MissingApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Resend API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed after {attempts} retries: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

pub struct OutgoingEmail<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub html: &'a str,
}

pub async fn send_email(
    client: &reqwest::Client,
    api_key: &str,
    email: OutgoingEmail<'_>,
) -> Result<(), MailError> {
    // Validate inputs
    if email.to.is_empty() || !email.to.contains('@') {
        return Err(MailError::InvalidRecipient(email.to.to_string()));
    }
    if api_key.is_empty() {
        return Err(MailError::MissingApiKey);
    }

    send_with_retries(client, api_key, &email).await
}

async fn send_with_retries(
    client: &reqwest::Client,
    api_key: &str,
    email: &OutgoingEmail<'_>,
) -> Result<(), MailError> {
    let mut last_error = None;

    for attempt in 1..=MAX_RETRIES {
        match send_via_resend(client, api_key, email).await {
            Ok(email_id) => {
                tracing::info!(
                    "✓ Email sent successfully to {} (id: {})",
                    email.to,
                    email_id
                );
                return Ok(());
            }
            Err(e) => {
                last_error = Some(e);
                if attempt < MAX_RETRIES {
                    let delay = RETRY_DELAY_MS * (2_u64.pow(attempt - 1)); // Exponential backoff
                    tracing::warn!(
                        "Email send attempt {} failed for {}. Retrying in {}ms...",
                        attempt,
                        email.to,
                        delay
                    );
                    sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    let last = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "Unknown email sending error".to_string());

    tracing::error!("✗ Email failed for {}: {}", email.to, last);
    Err(MailError::RetriesExhausted {
        attempts: MAX_RETRIES,
        last,
    })
}

async fn send_via_resend(
    client: &reqwest::Client,
    api_key: &str,
    email: &OutgoingEmail<'_>,
) -> Result<String, MailError> {
    let request_body = json!({
        "from": email.from,
        "to": email.to,
        "subject": email.subject,
        "html": email.html,
    });

    let response = client
        .post(RESEND_ENDPOINT)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&request_body)
        .send()
        .await
        .map_err(|e| MailError::Network(e.to_string()))?;

    let status = response.status();
    let response_text = response
        .text()
        .await
        .unwrap_or_else(|_| "No response body".to_string());

    if status.is_success() {
        // Extract email ID from response
        if let Ok(body) = serde_json::from_str::<serde_json::Value>(&response_text) {
            if let Some(id) = body.get("id").and_then(|v| v.as_str()) {
                return Ok(id.to_string());
            }
        }
        Ok("success".to_string())
    } else {
        Err(MailError::Api {
            status: status.as_u16(),
            body: response_text,
        })
    }
}
