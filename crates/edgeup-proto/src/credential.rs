//! Tunnel credential classification
//!
//! The tunnel credential arrives as a single opaque string. It is classified
//! once into a tagged variant and every consumer dispatches on the variant.

use serde::Deserialize;
use thiserror::Error;

/// Marker present in every structured (JSON) tunnel secret
pub const STRUCTURED_SECRET_MARKER: &str = "TunnelSecret";

const TOKEN_MIN_LEN: usize = 120;
const TOKEN_MAX_LEN: usize = 250;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Failed to parse tunnel secret: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Tunnel secret has no TunnelID")]
    MissingTunnelId,
}

/// A JSON-encoded tunnel secret (account tag, tunnel id, key material)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredSecret {
    raw: String,
}

#[derive(Deserialize)]
struct SecretFields {
    #[serde(rename = "TunnelID")]
    tunnel_id: Option<String>,
}

impl StructuredSecret {
    /// Raw JSON as supplied, written verbatim as the credentials file
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn tunnel_id(&self) -> Result<String, CredentialError> {
        let fields: SecretFields = serde_json::from_str(&self.raw)?;
        fields
            .tunnel_id
            .filter(|id| !id.is_empty())
            .ok_or(CredentialError::MissingTunnelId)
    }
}

/// How the tunnel client authenticates, derived from the credential string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelCredential {
    /// Opaque connection token for a named tunnel
    Token(String),
    /// JSON secret; the client runs from a rendered ingress document
    StructuredSecret(StructuredSecret),
    /// No usable credential; an anonymous tunnel with a random hostname
    QuickTunnel,
}

impl TunnelCredential {
    /// Classify a credential string. Every input maps to exactly one variant.
    pub fn classify(value: &str) -> Self {
        if is_token(value) {
            TunnelCredential::Token(value.to_string())
        } else if value.contains(STRUCTURED_SECRET_MARKER) {
            TunnelCredential::StructuredSecret(StructuredSecret {
                raw: value.to_string(),
            })
        } else {
            TunnelCredential::QuickTunnel
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TunnelCredential::Token(_) => "token",
            TunnelCredential::StructuredSecret(_) => "structured-secret",
            TunnelCredential::QuickTunnel => "quick-tunnel",
        }
    }
}

/// `^[A-Za-z0-9=]{120,250}$`
fn is_token(value: &str) -> bool {
    (TOKEN_MIN_LEN..=TOKEN_MAX_LEN).contains(&value.len())
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '=')
}
