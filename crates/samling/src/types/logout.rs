//! SAML Single Logout types.
//!
//! Like [`super::Response`], these message kinds exist so the object model
//! is total; the mapper reports them as unsupported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signature::{Signable, SignatureRecord, SigningKey};

use super::{Issuer, NameId, Status};

/// SAML LogoutRequest message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoutRequest {
    /// Unique identifier for this request.
    pub id: String,

    /// Version of the SAML protocol (always "2.0").
    pub version: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// The issuing entity.
    pub issuer: Issuer,

    /// The endpoint this request was sent to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Time after which the request is void.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// Reason for the logout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<LogoutReason>,

    /// The principal being logged out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id: Option<NameId>,

    /// Session indexes being terminated.
    #[serde(default)]
    pub session_indexes: Vec<String>,

    /// The verified signature covering this request, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureRecord>,

    /// Key used to sign this request on serialization.
    #[serde(skip)]
    pub signing_key: Option<SigningKey>,
}

impl Signable for LogoutRequest {
    fn signature(&self) -> Option<&SignatureRecord> {
        self.signature.as_ref()
    }

    fn set_signature(&mut self, record: SignatureRecord) {
        self.signature = Some(record);
    }
}

/// SAML LogoutResponse message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoutResponse {
    /// Unique identifier for this response.
    pub id: String,

    /// Version of the SAML protocol (always "2.0").
    pub version: String,

    /// Timestamp when this response was issued.
    pub issue_instant: DateTime<Utc>,

    /// The request ID this responds to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// The issuing entity.
    pub issuer: Issuer,

    /// The endpoint this response was sent to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// The processing status.
    pub status: Status,

    /// The verified signature covering this response, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureRecord>,

    /// Key used to sign this response on serialization.
    #[serde(skip)]
    pub signing_key: Option<SigningKey>,
}

impl Signable for LogoutResponse {
    fn signature(&self) -> Option<&SignatureRecord> {
        self.signature.as_ref()
    }

    fn set_signature(&mut self, record: SignatureRecord) {
        self.signature = Some(record);
    }
}

/// Reason for a logout request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogoutReason {
    /// The user requested the logout.
    User,
    /// An administrator requested the logout.
    Admin,
}

impl LogoutReason {
    /// Returns the URI for this reason.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::User => "urn:oasis:names:tc:SAML:2.0:logout:user",
            Self::Admin => "urn:oasis:names:tc:SAML:2.0:logout:admin",
        }
    }

    /// Parses a reason from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "urn:oasis:names:tc:SAML:2.0:logout:user" => Some(Self::User),
            "urn:oasis:names:tc:SAML:2.0:logout:admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logout_reason_uri_round_trip() {
        for reason in [LogoutReason::User, LogoutReason::Admin] {
            assert_eq!(LogoutReason::from_uri(reason.uri()), Some(reason));
        }
        assert_eq!(LogoutReason::from_uri("urn:other"), None);
    }
}
