use crate::error::{AppError, Result};

/// The exact length of a session token (hyphenated UUID v4).
const TOKEN_LENGTH: usize = 36;

/// Validates a session token.
///
/// Tokens are hyphenated lowercase UUIDs. Anything else is rejected before
/// the token is ever resolved to a file path, closing off path traversal.
///
/// # Arguments
///
/// * `token` - The token to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the token is well-formed.
pub fn validate_token(token: &str) -> Result<()> {
    if token.len() != TOKEN_LENGTH {
        return Err(AppError::InvalidToken);
    }

    if !token
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase() || c == '-')
    {
        return Err(AppError::InvalidToken);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_uuid_v4_tokens() {
        let token = uuid::Uuid::new_v4().to_string();
        assert!(validate_token(&token).is_ok());
    }

    #[test]
    fn rejects_path_traversal_attempts() {
        assert!(validate_token("../../../../../../etc/passwd-0000").is_err());
        assert!(validate_token("..%2f..%2f..%2fetc%2fpasswd-000000000").is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(validate_token("").is_err());
        assert!(validate_token("abc").is_err());
        assert!(validate_token(&"a".repeat(64)).is_err());
    }

    #[test]
    fn rejects_uppercase_and_non_hex() {
        assert!(validate_token("DEADBEEF-dead-beef-dead-beefdeadbeef").is_err());
        assert!(validate_token("zzzzzzzz-zzzz-zzzz-zzzz-zzzzzzzzzzzz").is_err());
    }
}
