//! SAML AuthnRequest types.
//!
//! Authentication request message sent by a service provider to an
//! identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signature::{Signable, SignatureRecord, SigningKey};

use super::{Issuer, NameIdPolicy, SamlBinding};

/// SAML Authentication Request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthnRequest {
    /// Unique identifier for this request.
    pub id: String,

    /// Version of the SAML protocol (always "2.0").
    pub version: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// The service provider issuing the request.
    pub issuer: Issuer,

    /// The URL where the response should be sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_url: Option<String>,

    /// Index into the SP's assertion consumer service list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_index: Option<u32>,

    /// The endpoint this request was sent to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Binding to use for the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_binding: Option<String>,

    /// Name ID policy constraints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id_policy: Option<NameIdPolicy>,

    /// Requested authentication context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_authn_context: Option<RequestedAuthnContext>,

    /// Whether the IdP must authenticate the user directly.
    #[serde(default)]
    pub force_authn: bool,

    /// Whether the IdP must not interact with the user.
    #[serde(default)]
    pub is_passive: bool,

    /// A human-readable name for the requester.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,

    /// Consent obtained for this request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent: Option<String>,

    /// The verified signature covering this request, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureRecord>,

    /// Key used to sign this request on serialization.
    #[serde(skip)]
    pub signing_key: Option<SigningKey>,
}

impl AuthnRequest {
    /// Creates a new authentication request.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            id: format!("_id{}", uuid::Uuid::new_v4()),
            version: "2.0".to_string(),
            issue_instant: Utc::now(),
            issuer: Issuer::new(issuer),
            assertion_consumer_service_url: None,
            assertion_consumer_service_index: None,
            destination: None,
            protocol_binding: None,
            name_id_policy: None,
            requested_authn_context: None,
            force_authn: false,
            is_passive: false,
            provider_name: None,
            consent: None,
            signature: None,
            signing_key: None,
        }
    }

    /// Creates a new authentication request with a custom ID.
    #[must_use]
    pub fn with_id(id: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new(issuer)
        }
    }

    /// Sets the assertion consumer service URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Sets the protocol binding for the response.
    #[must_use]
    pub fn with_binding(mut self, binding: SamlBinding) -> Self {
        self.protocol_binding = Some(binding.uri().to_string());
        self
    }

    /// Sets the name ID policy.
    #[must_use]
    pub fn with_name_id_policy(mut self, policy: NameIdPolicy) -> Self {
        self.name_id_policy = Some(policy);
        self
    }

    /// Sets force authentication.
    #[must_use]
    pub const fn force_authn(mut self, force: bool) -> Self {
        self.force_authn = force;
        self
    }

    /// Sets the signing key used on serialization.
    #[must_use]
    pub fn with_signing_key(mut self, key: SigningKey) -> Self {
        self.signing_key = Some(key);
        self
    }

    /// Returns the parsed protocol binding.
    #[must_use]
    pub fn parsed_binding(&self) -> Option<SamlBinding> {
        self.protocol_binding.as_deref().and_then(SamlBinding::from_uri)
    }
}

impl Signable for AuthnRequest {
    fn signature(&self) -> Option<&SignatureRecord> {
        self.signature.as_ref()
    }

    fn set_signature(&mut self, record: SignatureRecord) {
        self.signature = Some(record);
    }
}

/// Requested authentication context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestedAuthnContext {
    /// Comparison method for the authentication context.
    #[serde(default)]
    pub comparison: AuthnContextComparison,

    /// Acceptable authentication context class references.
    #[serde(default)]
    pub class_refs: Vec<String>,
}

impl RequestedAuthnContext {
    /// Creates a context requiring exact match of a class reference.
    #[must_use]
    pub fn exact(class_ref: impl Into<String>) -> Self {
        Self {
            comparison: AuthnContextComparison::Exact,
            class_refs: vec![class_ref.into()],
        }
    }
}

/// Authentication context comparison methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthnContextComparison {
    /// Exact match required.
    #[default]
    Exact,
    /// Match must be at least as strong.
    Minimum,
    /// Match must be at most as strong.
    Maximum,
    /// Match must be stronger.
    Better,
}

impl AuthnContextComparison {
    /// Returns the attribute value for this comparison.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Minimum => "minimum",
            Self::Maximum => "maximum",
            Self::Better => "better",
        }
    }

    /// Parses a comparison attribute value.
    #[must_use]
    pub fn from_str_opt(value: &str) -> Option<Self> {
        match value {
            "exact" => Some(Self::Exact),
            "minimum" => Some(Self::Minimum),
            "maximum" => Some(Self::Maximum),
            "better" => Some(Self::Better),
            _ => None,
        }
    }
}
