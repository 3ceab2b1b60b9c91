//! SAML metadata types.
//!
//! Entity descriptors describe a provider's endpoints, keys, and
//! capabilities; an entities descriptor aggregates several of them, each
//! possibly signed on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signature::{Signable, SignatureRecord, SigningKey};

use super::SamlBinding;

/// Metadata for one entity (an `<md:EntityDescriptor>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Document ID (the signature reference target).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The entity ID.
    pub entity_id: String,

    /// Short alias: the host of the entity ID when it is a URL, else the
    /// entity ID itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_alias: Option<String>,

    /// Expiry of this metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,

    /// Suggested cache duration (XML duration literal, e.g. `PT1H`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_duration: Option<String>,

    /// The provider roles this entity implements.
    #[serde(default)]
    pub providers: Vec<Provider>,

    /// The verified signature covering this entity, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureRecord>,

    /// Key used to sign this metadata on serialization.
    #[serde(skip)]
    pub signing_key: Option<SigningKey>,
}

impl Metadata {
    /// Creates metadata for an entity.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            id: None,
            entity_id: entity_id.into(),
            entity_alias: None,
            valid_until: None,
            cache_duration: None,
            providers: Vec::new(),
            signature: None,
            signing_key: None,
        }
    }

    /// Sets the document ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds a provider role.
    #[must_use]
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    /// Sets the signing key used on serialization.
    #[must_use]
    pub fn with_signing_key(mut self, key: SigningKey) -> Self {
        self.signing_key = Some(key);
        self
    }

    /// True if every provider role is a service provider.
    #[must_use]
    pub fn is_service_provider(&self) -> bool {
        !self.providers.is_empty()
            && self
                .providers
                .iter()
                .all(|p| matches!(p, Provider::ServiceProvider(_)))
    }

    /// True if every provider role is an identity provider.
    #[must_use]
    pub fn is_identity_provider(&self) -> bool {
        !self.providers.is_empty()
            && self
                .providers
                .iter()
                .all(|p| matches!(p, Provider::IdentityProvider(_)))
    }
}

impl Signable for Metadata {
    fn signature(&self) -> Option<&SignatureRecord> {
        self.signature.as_ref()
    }

    fn set_signature(&mut self, record: SignatureRecord) {
        self.signature = Some(record);
    }
}

/// An aggregate of entity metadata (an `<md:EntitiesDescriptor>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitiesCollection {
    /// Document ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Name of the aggregate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The contained entities, in document order.
    pub entities: Vec<Metadata>,

    /// The verified signature covering the whole aggregate, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureRecord>,
}

impl EntitiesCollection {
    /// Creates an aggregate from entities.
    #[must_use]
    pub fn new(entities: Vec<Metadata>) -> Self {
        Self {
            id: None,
            name: None,
            entities,
            signature: None,
        }
    }
}

impl Signable for EntitiesCollection {
    fn signature(&self) -> Option<&SignatureRecord> {
        self.signature.as_ref()
    }

    fn set_signature(&mut self, record: SignatureRecord) {
        self.signature = Some(record);
    }
}

/// A provider role inside an entity descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Provider {
    /// An `<md:SPSSODescriptor>` role.
    ServiceProvider(SpDescriptor),
    /// An `<md:IDPSSODescriptor>` role.
    IdentityProvider(IdpDescriptor),
}

/// Service provider role description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpDescriptor {
    /// Role element ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Expiry of this role description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,

    /// Suggested cache duration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_duration: Option<String>,

    /// Supported protocol URIs.
    #[serde(default)]
    pub protocol_support_enumeration: Vec<String>,

    /// Whether authentication requests from this SP are signed.
    #[serde(default)]
    pub authn_requests_signed: bool,

    /// Whether this SP requires signed assertions.
    #[serde(default)]
    pub want_assertions_signed: bool,

    /// Supported name ID format URIs.
    #[serde(default)]
    pub name_id_formats: Vec<String>,

    /// Published keys.
    #[serde(default)]
    pub key_descriptors: Vec<KeyDescriptor>,

    /// Assertion consumer endpoints (indexed).
    #[serde(default)]
    pub assertion_consumer_services: Vec<Endpoint>,

    /// Single logout endpoints.
    #[serde(default)]
    pub single_logout_services: Vec<Endpoint>,

    /// Artifact resolution endpoints (indexed).
    #[serde(default)]
    pub artifact_resolution_services: Vec<Endpoint>,

    /// Attributes this SP requests.
    #[serde(default)]
    pub requested_attributes: Vec<RequestedAttribute>,
}

/// Identity provider role description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IdpDescriptor {
    /// Role element ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Expiry of this role description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,

    /// Suggested cache duration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_duration: Option<String>,

    /// Supported protocol URIs.
    #[serde(default)]
    pub protocol_support_enumeration: Vec<String>,

    /// Whether this IdP requires signed authentication requests.
    #[serde(default)]
    pub want_authn_requests_signed: bool,

    /// Supported name ID format URIs.
    #[serde(default)]
    pub name_id_formats: Vec<String>,

    /// Published keys.
    #[serde(default)]
    pub key_descriptors: Vec<KeyDescriptor>,

    /// Single sign-on endpoints.
    #[serde(default)]
    pub single_sign_on_services: Vec<Endpoint>,

    /// Single logout endpoints.
    #[serde(default)]
    pub single_logout_services: Vec<Endpoint>,

    /// Artifact resolution endpoints (indexed).
    #[serde(default)]
    pub artifact_resolution_services: Vec<Endpoint>,
}

/// A protocol endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// The binding this endpoint speaks.
    pub binding: SamlBinding,

    /// The endpoint URL.
    pub location: String,

    /// Where responses go, when different from `location`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_location: Option<String>,

    /// Index, for indexed endpoint lists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,

    /// Whether this is the default endpoint of its list.
    #[serde(default)]
    pub is_default: bool,
}

impl Endpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(binding: SamlBinding, location: impl Into<String>) -> Self {
        Self {
            binding,
            location: location.into(),
            response_location: None,
            index: None,
            is_default: false,
        }
    }

    /// Sets the index.
    #[must_use]
    pub const fn with_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    /// Marks this endpoint as default.
    #[must_use]
    pub const fn default_endpoint(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Intended use of a published key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeyUse {
    /// Signing key.
    #[default]
    Signing,
    /// Encryption key.
    Encryption,
    /// No declared use.
    Unspecified,
}

impl KeyUse {
    /// Returns the metadata attribute value, if any.
    #[must_use]
    pub const fn as_str(&self) -> Option<&'static str> {
        match self {
            Self::Signing => Some("signing"),
            Self::Encryption => Some("encryption"),
            Self::Unspecified => None,
        }
    }

    /// Parses a metadata `use` attribute value.
    #[must_use]
    pub fn from_str_opt(value: Option<&str>) -> Self {
        match value {
            Some("signing") => Self::Signing,
            Some("encryption") => Self::Encryption,
            _ => Self::Unspecified,
        }
    }
}

/// A published key inside a role descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDescriptor {
    /// Declared key use.
    #[serde(default)]
    pub usage: KeyUse,

    /// Base64 DER certificate content of the KeyInfo.
    pub certificate: String,
}

/// An attribute requested by a service provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestedAttribute {
    /// The attribute name.
    pub name: String,

    /// A human-readable name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// The attribute name format URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_format: Option<String>,

    /// Whether the attribute is required.
    #[serde(default)]
    pub required: bool,
}

/// Derives the entity alias: the host of a URL entity ID, else the entity
/// ID unchanged.
#[must_use]
pub fn entity_alias_for(entity_id: &str) -> String {
    let rest = entity_id
        .strip_prefix("https://")
        .or_else(|| entity_id.strip_prefix("http://"));
    match rest {
        Some(rest) => rest
            .split(['/', ':'])
            .next()
            .unwrap_or(rest)
            .to_string(),
        None => entity_id.to_string(),
    }
}
