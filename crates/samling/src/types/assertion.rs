//! SAML Assertion types.
//!
//! Assertions contain statements about a subject made by an issuer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signature::{Signable, SignatureRecord, SigningKey};

use super::{Issuer, NameId};

/// SAML Assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    /// Unique identifier for this assertion.
    pub id: String,

    /// Version of the SAML protocol (always "2.0").
    pub version: String,

    /// Timestamp when this assertion was issued.
    pub issue_instant: DateTime<Utc>,

    /// The identity provider that issued this assertion.
    pub issuer: Issuer,

    /// The subject of this assertion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,

    /// Conditions that gate the assertion's validity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,

    /// Authentication statements.
    #[serde(default)]
    pub authn_statements: Vec<AuthnStatement>,

    /// Attributes about the subject.
    #[serde(default)]
    pub attributes: Vec<Attribute>,

    /// The verified signature covering this assertion, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureRecord>,

    /// Key used to sign this assertion on serialization.
    #[serde(skip)]
    pub signing_key: Option<SigningKey>,
}

impl Assertion {
    /// Creates a new assertion.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            id: format!("A{}", uuid::Uuid::new_v4()),
            version: "2.0".to_string(),
            issue_instant: Utc::now(),
            issuer: Issuer::new(issuer),
            subject: None,
            conditions: None,
            authn_statements: Vec::new(),
            attributes: Vec::new(),
            signature: None,
            signing_key: None,
        }
    }

    /// Creates a new assertion with a custom ID.
    #[must_use]
    pub fn with_id(id: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new(issuer)
        }
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Sets the conditions.
    #[must_use]
    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Adds an authentication statement.
    #[must_use]
    pub fn with_authn_statement(mut self, statement: AuthnStatement) -> Self {
        self.authn_statements.push(statement);
        self
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Sets the signing key used on serialization.
    #[must_use]
    pub fn with_signing_key(mut self, key: SigningKey) -> Self {
        self.signing_key = Some(key);
        self
    }
}

impl Signable for Assertion {
    fn signature(&self) -> Option<&SignatureRecord> {
        self.signature.as_ref()
    }

    fn set_signature(&mut self, record: SignatureRecord) {
        self.signature = Some(record);
    }
}

/// Subject of an assertion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Subject {
    /// The name identifier for the subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id: Option<NameId>,

    /// Subject confirmations.
    #[serde(default)]
    pub confirmations: Vec<SubjectConfirmation>,
}

impl Subject {
    /// Creates a subject with a name ID.
    #[must_use]
    pub fn new(name_id: NameId) -> Self {
        Self {
            name_id: Some(name_id),
            confirmations: Vec::new(),
        }
    }

    /// Adds a subject confirmation.
    #[must_use]
    pub fn with_confirmation(mut self, confirmation: SubjectConfirmation) -> Self {
        self.confirmations.push(confirmation);
        self
    }
}

/// Subject confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectConfirmation {
    /// The confirmation method URI.
    pub method: String,

    /// Name identifier carried by the confirmation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id: Option<NameId>,

    /// Additional confirmation data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SubjectConfirmationData>,
}

impl SubjectConfirmation {
    /// Bearer confirmation method URI.
    pub const BEARER: &'static str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";

    /// Creates a bearer confirmation.
    #[must_use]
    pub fn bearer() -> Self {
        Self {
            method: Self::BEARER.to_string(),
            name_id: None,
            data: None,
        }
    }

    /// Sets the confirmation data.
    #[must_use]
    pub fn with_data(mut self, data: SubjectConfirmationData) -> Self {
        self.data = Some(data);
        self
    }
}

/// Subject confirmation data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubjectConfirmationData {
    /// The request ID this assertion responds to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// Time before which the subject cannot be confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    /// Time after which the subject can no longer be confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// The location the assertion may be presented to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

/// Conditions for assertion validity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Conditions {
    /// Time before which the assertion is not valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    /// Time at or after which the assertion is not valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// Audience restrictions.
    #[serde(default)]
    pub audience_restrictions: Vec<AudienceRestriction>,

    /// One-time use condition.
    #[serde(default)]
    pub one_time_use: bool,
}

impl Conditions {
    /// Adds an audience restriction with a single audience.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience_restrictions.push(AudienceRestriction {
            audiences: vec![audience.into()],
        });
        self
    }
}

/// Audience restriction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AudienceRestriction {
    /// List of valid audiences.
    pub audiences: Vec<String>,
}

/// Authentication statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthnStatement {
    /// The time of authentication.
    pub authn_instant: DateTime<Utc>,

    /// The session index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_index: Option<String>,

    /// Time at which the session ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_not_on_or_after: Option<DateTime<Utc>>,

    /// Authentication context class reference URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authn_context_class_ref: Option<String>,
}

/// SAML Attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// The attribute name (typically a URI).
    pub name: String,

    /// A human-readable name for the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// The format of the attribute name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_format: Option<String>,

    /// The attribute values.
    pub values: Vec<String>,
}

impl Attribute {
    /// Creates an attribute with a single value.
    #[must_use]
    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            friendly_name: None,
            name_format: None,
            values: vec![value.into()],
        }
    }

    /// Sets the friendly name.
    #[must_use]
    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assertion_construction() {
        let assertion = Assertion::new("https://idp.example.com")
            .with_subject(Subject::new(NameId::email("user@example.com")))
            .with_conditions(Conditions::default().with_audience("https://sp.example.com"))
            .with_attribute(Attribute::single("email", "user@example.com"));

        assert!(!assertion.id.is_empty());
        assert_eq!(assertion.issuer.value, "https://idp.example.com");
        assert!(assertion.subject.is_some());
        assert_eq!(assertion.attributes.len(), 1);
        assert!(assertion.signature.is_none());
    }

    #[test]
    fn bearer_confirmation() {
        let confirmation = SubjectConfirmation::bearer().with_data(SubjectConfirmationData {
            in_response_to: Some("_req1".to_string()),
            recipient: Some("https://sp.example.com/acs".to_string()),
            ..SubjectConfirmationData::default()
        });
        assert_eq!(confirmation.method, SubjectConfirmation::BEARER);
        assert!(confirmation.data.unwrap().not_before.is_none());
    }
}
