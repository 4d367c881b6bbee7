//! Authorization rules applied to verified claims

use thiserror::Error;

use crate::Claims;

/// A request failed an authorization rule
///
/// The `code` is the HTTP status the rule maps to: `401` for
/// authentication failures and `403` for insufficient access.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthRuleError {
    /// HTTP status code
    pub code: u16,
    /// Machine-readable reason
    pub message: String,
}

impl AuthRuleError {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Requires an authenticated caller with both an audience and a subject
pub fn require_authenticated(claims: Option<&Claims>) -> Result<&Claims, AuthRuleError> {
    let claims = claims.ok_or_else(|| AuthRuleError::new(401, "no-anonym-access"))?;

    if claims.aud.is_empty() {
        return Err(AuthRuleError::new(401, "authentication-aud-missing"));
    }

    if claims.sub.is_none() {
        return Err(AuthRuleError::new(401, "authentication-sub-missing"));
    }

    Ok(claims)
}

/// Requires the named claim to hold exactly `expected`
///
/// `custom_error` replaces the default `access-not-granted` reason.
pub fn require_claim(
    claims: &Claims,
    name: &str,
    expected: impl Into<serde_json::Value>,
    custom_error: Option<&str>,
) -> Result<(), AuthRuleError> {
    if claims.claim(name) == Some(expected.into()) {
        Ok(())
    } else {
        Err(AuthRuleError::new(
            403,
            custom_error.unwrap_or("access-not-granted"),
        ))
    }
}
