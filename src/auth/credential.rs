//! Bearer credential types.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Short-lived bearer secret. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// A freshly minted bearer token and its expiry.
///
/// Accepts the credential endpoint's `{ access, access_expiration }` shape as well as
/// `{ token, expiresAt }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credential {
    #[serde(rename = "access", alias = "token")]
    pub token: BearerToken,

    #[serde(
        rename = "access_expiration",
        alias = "expiresAt",
        with = "time::serde::rfc3339"
    )]
    pub expires_at: OffsetDateTime,
}

impl Credential {
    pub fn new(token: BearerToken, expires_at: OffsetDateTime) -> Self {
        Self { token, expires_at }
    }
}
