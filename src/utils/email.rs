// utils/email.rs
use validator::validate_email;

/// Longest address that fits a forward-path (RFC 5321) and the ledger columns.
pub const MAX_EMAIL_LEN: usize = 254;

/// Canonical form used for every comparison and for storage.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Normalizes and checks syntax in one pass. `None` for empty or invalid input.
pub fn parse_email(raw: &str) -> Option<String> {
    let email = normalize_email(raw);
    if email.is_empty() || email.len() > MAX_EMAIL_LEN || !validate_email(email.as_str()) {
        return None;
    }
    Some(email)
}
