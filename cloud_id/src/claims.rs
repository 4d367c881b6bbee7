//! Registered and private token claims

use aliri::jwt::{self, Audiences, CoreClaims};
use aliri_clock::UnixTime;
use serde::{Deserialize, Serialize};

/// The claims carried by a token
///
/// Registered claims are exposed as fields; any other claims are retained
/// in [`extra`][Claims::extra] and survive a verify/sign round trip.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct Claims {
    /// Audience
    #[serde(default, skip_serializing_if = "Audiences::is_empty")]
    pub aud: Audiences,
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<jwt::Issuer>,
    /// Subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<jwt::Subject>,
    /// Expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<UnixTime>,
    /// Not before
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<UnixTime>,
    /// Issued at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<UnixTime>,
    /// Private claims
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    /// An empty claim set
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the audience
    pub fn with_audience(mut self, aud: impl Into<jwt::Audience>) -> Self {
        self.aud = Audiences::single(aud);
        self
    }

    /// Sets the issuer
    pub fn with_issuer(mut self, iss: impl Into<jwt::Issuer>) -> Self {
        self.iss = Some(iss.into());
        self
    }

    /// Sets the subject
    pub fn with_subject(mut self, sub: impl Into<jwt::Subject>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    /// Sets the expiration time
    pub fn with_expiration(mut self, time: UnixTime) -> Self {
        self.exp = Some(time);
        self
    }

    /// Sets the time before which the token is not valid
    pub fn with_not_before(mut self, time: UnixTime) -> Self {
        self.nbf = Some(time);
        self
    }

    /// Adds a private claim
    pub fn with_claim(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Looks up a claim by name, registered or private
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<serde_json::Value> {
        let registered = match name {
            "aud" if !self.aud.is_empty() => serde_json::to_value(&self.aud).ok(),
            "iss" => self.iss.as_ref().map(|v| v.as_str().into()),
            "sub" => self.sub.as_ref().map(|v| v.as_str().into()),
            "exp" => self.exp.map(|v| v.0.into()),
            "nbf" => self.nbf.map(|v| v.0.into()),
            "iat" => self.iat.map(|v| v.0.into()),
            _ => None,
        };

        registered.or_else(|| self.extra.get(name).cloned())
    }
}

impl CoreClaims for Claims {
    fn nbf(&self) -> Option<UnixTime> {
        self.nbf
    }

    fn exp(&self) -> Option<UnixTime> {
        self.exp
    }

    fn aud(&self) -> &Audiences {
        &self.aud
    }

    fn iss(&self) -> Option<&jwt::IssuerRef> {
        self.iss.as_deref()
    }

    fn sub(&self) -> Option<&jwt::SubjectRef> {
        self.sub.as_deref()
    }
}
