//! SAML Response types.
//!
//! The response message type exists so the object model is total, but the
//! mapper does not implement this kind yet; resolving or serializing one
//! reports the unsupported kind instead of producing an empty object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signature::{Signable, SignatureRecord, SigningKey};

use super::{Assertion, Issuer, Status};

/// SAML Response to an authentication request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Unique identifier for this response.
    pub id: String,

    /// Version of the SAML protocol (always "2.0").
    pub version: String,

    /// Timestamp when this response was issued.
    pub issue_instant: DateTime<Utc>,

    /// The request ID this responds to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// The endpoint this response was sent to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Consent obtained for this response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent: Option<String>,

    /// The issuing identity provider.
    pub issuer: Issuer,

    /// The processing status.
    pub status: Status,

    /// Contained assertions.
    #[serde(default)]
    pub assertions: Vec<Assertion>,

    /// The verified signature covering this response, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureRecord>,

    /// Key used to sign this response on serialization.
    #[serde(skip)]
    pub signing_key: Option<SigningKey>,
}

impl Signable for Response {
    fn signature(&self) -> Option<&SignatureRecord> {
        self.signature.as_ref()
    }

    fn set_signature(&mut self, record: SignatureRecord) {
        self.signature = Some(record);
    }
}
