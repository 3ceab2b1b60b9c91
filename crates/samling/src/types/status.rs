//! SAML status types.

use serde::{Deserialize, Serialize};

use super::status_codes;

/// Status of a SAML response message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// The top-level status code.
    pub code: StatusCode,

    /// Human-readable status message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Status {
    /// A success status.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            code: StatusCode::Success,
            message: None,
        }
    }
}

/// Top-level SAML status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    /// The request succeeded.
    Success,
    /// Error attributable to the requester.
    Requester,
    /// Error attributable to the responder.
    Responder,
    /// Unsupported SAML version.
    VersionMismatch,
}

impl StatusCode {
    /// Returns the URI for this status code.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Success => status_codes::SUCCESS,
            Self::Requester => status_codes::REQUESTER,
            Self::Responder => status_codes::RESPONDER,
            Self::VersionMismatch => status_codes::VERSION_MISMATCH,
        }
    }

    /// Parses a status code from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            status_codes::SUCCESS => Some(Self::Success),
            status_codes::REQUESTER => Some(Self::Requester),
            status_codes::RESPONDER => Some(Self::Responder),
            status_codes::VERSION_MISMATCH => Some(Self::VersionMismatch),
            _ => None,
        }
    }
}
