//! Input validation.
//!
//! Validates variable names, secret names and passphrases.

use crate::error::{Result, ValidationError};

/// Validate a manifest variable name.
///
/// Variable names are projected into the process environment, so they must
/// be valid environment variable names:
/// - Only ASCII letters, digits, and underscore
/// - Cannot start with a digit
/// - Cannot be empty
pub fn validate_var_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName.into());
    }

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidName {
            name: name.to_string(),
            reason: "cannot start with a digit".to_string(),
        }
        .into());
    }

    for (i, ch) in name.chars().enumerate() {
        if !ch.is_ascii_alphanumeric() && ch != '_' {
            return Err(ValidationError::InvalidName {
                name: name.to_string(),
                reason: format!(
                    "invalid character '{}' at position {}. Only letters, digits, and underscore are allowed",
                    ch,
                    i + 1
                ),
            }
            .into());
        }
    }

    Ok(())
}

/// Validate a secret name.
///
/// Secret names follow secret-manager conventions: letters, digits, `-`,
/// `_` and `.`.
pub fn validate_secret_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName.into());
    }

    if let Some(ch) = name
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.'))
    {
        return Err(ValidationError::InvalidName {
            name: name.to_string(),
            reason: format!("invalid character '{}'", ch.escape_default()),
        }
        .into());
    }

    Ok(())
}

/// Passphrases cannot be empty.
pub fn validate_passphrase(passphrase: &str) -> Result<()> {
    if passphrase.is_empty() {
        return Err(ValidationError::EmptyPassphrase.into());
    }
    Ok(())
}
