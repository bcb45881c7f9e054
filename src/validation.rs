//! Input validation for player-facing fields: display names, emails and passwords.

use std::collections::HashSet;

use crate::progression::UNSET_USERNAME;

/// Username validation errors with helpful messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsernameError {
    #[error("Missing username")]
    Missing,

    #[error("Username is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Username cannot start or end with whitespace")]
    InvalidWhitespace,

    #[error("Username contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },

    #[error("Username is a reserved name")]
    Reserved,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmailError {
    #[error("Missing email")]
    Missing,

    #[error("Invalid email")]
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordError {
    #[error("Missing password")]
    Missing,

    #[error("Password is too short (minimum {min} characters)")]
    TooShort { min: usize },

    #[error("Password is too long")]
    TooLong,
}

/// Display-name rules.
#[derive(Debug, Clone)]
pub struct UsernameRules {
    pub max_length: usize,
    pub allow_spaces: bool,
    pub allow_unicode: bool,
}

impl UsernameRules {
    /// Rules applied to player display names.
    pub fn player() -> Self {
        UsernameRules {
            max_length: 24,
            allow_spaces: true,
            allow_unicode: true,
        }
    }
}

/// Longest accepted password, in bytes.
pub const MAX_PASSWORD_BYTES: usize = 128;

/// Names a player may not pick. The unset sentinel is in here so a chosen name
/// can never be mistaken for "no name yet".
fn reserved_names() -> HashSet<&'static str> {
    [
        UNSET_USERNAME, "none", "admin", "administrator", "root", "system", "moderator",
        "guest", "anonymous", "player", "server",
    ]
    .iter()
    .copied()
    .collect()
}

/// Validate a display name according to the given rules, returning the name to store.
pub fn validate_username(username: &str, rules: &UsernameRules) -> Result<String, UsernameError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(UsernameError::Missing);
    }
    if trimmed.chars().count() > rules.max_length {
        return Err(UsernameError::TooLong {
            max: rules.max_length,
        });
    }
    if trimmed != username {
        return Err(UsernameError::InvalidWhitespace);
    }
    if reserved_names().contains(trimmed.to_lowercase().as_str()) {
        return Err(UsernameError::Reserved);
    }

    let mut invalid: Vec<char> = trimmed
        .chars()
        .filter(|&ch| {
            let ok = if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.') {
                true
            } else if ch == ' ' {
                rules.allow_spaces
            } else if !ch.is_ascii() && ch.is_alphanumeric() {
                rules.allow_unicode
            } else {
                false
            };
            !ok
        })
        .collect();

    if !invalid.is_empty() {
        invalid.sort_unstable();
        invalid.dedup();
        let chars = invalid
            .into_iter()
            .map(|c| {
                if c.is_control() {
                    format!("\\u{{{:04x}}}", c as u32)
                } else {
                    c.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        return Err(UsernameError::InvalidCharacters { chars });
    }

    Ok(trimmed.to_string())
}

/// Validate a player display name with the default rules.
pub fn validate_player_name(name: &str) -> Result<String, UsernameError> {
    validate_username(name, &UsernameRules::player())
}

/// Normalize and syntax-check an email address. Returns the lowercase form.
pub fn validate_email(email: &str) -> Result<String, EmailError> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Err(EmailError::Missing);
    }
    if trimmed.len() > 254 || trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(EmailError::Invalid);
    }
    let Some((local, domain)) = trimmed.split_once('@') else {
        return Err(EmailError::Invalid);
    };
    let domain_ok = !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..");
    if local.is_empty() || !domain_ok {
        return Err(EmailError::Invalid);
    }
    Ok(trimmed.to_lowercase())
}

/// Check a new password against the configured minimum length.
pub fn check_password_strength(password: &str, min_length: usize) -> Result<(), PasswordError> {
    if password.is_empty() {
        return Err(PasswordError::Missing);
    }
    if password.chars().count() < min_length {
        return Err(PasswordError::TooShort { min: min_length });
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(PasswordError::TooLong);
    }
    Ok(())
}

/// Mask an email for logs: `alice@example.com` => `a***@example.com`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_names() {
        assert_eq!(validate_player_name("Alice").unwrap(), "Alice");
        assert_eq!(validate_player_name("dark knight").unwrap(), "dark knight");
        assert_eq!(validate_player_name("Łucja_9").unwrap(), "Łucja_9");
    }

    #[test]
    fn rejects_empty_and_blank_names() {
        assert_eq!(validate_player_name(""), Err(UsernameError::Missing));
        assert_eq!(validate_player_name("   "), Err(UsernameError::Missing));
    }

    #[test]
    fn rejects_sentinel_and_reserved() {
        assert_eq!(validate_player_name("null"), Err(UsernameError::Reserved));
        assert_eq!(validate_player_name("Admin"), Err(UsernameError::Reserved));
    }

    #[test]
    fn rejects_padding_and_symbols() {
        assert_eq!(
            validate_player_name(" bob"),
            Err(UsernameError::InvalidWhitespace)
        );
        assert!(matches!(
            validate_player_name("bob<script>"),
            Err(UsernameError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            validate_player_name("a\u{0007}b"),
            Err(UsernameError::InvalidCharacters { .. })
        ));
    }

    #[test]
    fn rejects_long_names() {
        let long = "x".repeat(25);
        assert_eq!(
            validate_player_name(&long),
            Err(UsernameError::TooLong { max: 24 })
        );
    }

    #[test]
    fn email_rules() {
        assert_eq!(validate_email("Alice@Example.com").unwrap(), "alice@example.com");
        assert_eq!(validate_email(""), Err(EmailError::Missing));
        assert_eq!(validate_email("alice"), Err(EmailError::Invalid));
        assert_eq!(validate_email("@example.com"), Err(EmailError::Invalid));
        assert_eq!(validate_email("a@b@c.com"), Err(EmailError::Invalid));
        assert_eq!(validate_email("a@localhost"), Err(EmailError::Invalid));
        assert_eq!(validate_email("a b@c.com"), Err(EmailError::Invalid));
    }

    #[test]
    fn password_rules() {
        assert_eq!(check_password_strength("", 6), Err(PasswordError::Missing));
        assert_eq!(
            check_password_strength("abc", 6),
            Err(PasswordError::TooShort { min: 6 })
        );
        assert!(check_password_strength("abcdef", 6).is_ok());
        assert_eq!(
            check_password_strength(&"p".repeat(200), 6),
            Err(PasswordError::TooLong)
        );
    }

    #[test]
    fn masks_email_for_logs() {
        assert_eq!(mask_email("alice@example.com"), "a***@example.com");
        assert_eq!(mask_email("broken"), "***");
    }
}
