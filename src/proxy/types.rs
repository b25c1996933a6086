//! Inbound request types.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

/// Client credential that redacts in Debug/Display and zeroizes on drop.
///
/// Only accessible via `.expose_secret()` so every use is grep-auditable.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    /// Whether the credential is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.expose_secret().trim().is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Credential::from)
    }
}

impl From<String> for Credential {
    fn from(s: String) -> Self {
        Credential(SecretString::from(s))
    }
}

impl From<&str> for Credential {
    fn from(s: &str) -> Self {
        Credential(SecretString::from(s))
    }
}

/// Body of `POST /api/relay`.
///
/// Every field is optional at the wire level so that absent fields surface
/// as `MissingField` rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRequest {
    /// Interpolated into the upstream URL template
    #[serde(default, alias = "projectId")]
    pub destination_id: Option<String>,
    /// Sent upstream as a bearer token
    #[serde(default, alias = "token")]
    pub credential: Option<Credential>,
    /// Opaque JSON forwarded as the upstream body
    #[serde(default, alias = "requestBody")]
    pub payload: Option<serde_json::Value>,
}

impl ForwardRequest {
    pub fn new(
        destination_id: impl Into<String>,
        credential: impl Into<Credential>,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            destination_id: Some(destination_id.into()),
            credential: Some(credential.into()),
            payload,
        }
    }

    /// Destination id for log lines, empty when absent.
    pub fn destination_label(&self) -> &str {
        self.destination_id.as_deref().unwrap_or_default()
    }
}
