//! XML signature trust resolution.
//!
//! SAML documents can carry any number of `<ds:Signature>` elements, each
//! covering a different subtree (a whole metadata aggregate, one entity
//! inside it, a single request). Element position is not a reliable way to
//! pair a signature with the object it covers, so this module resolves
//! trust in two steps:
//!
//! 1. [`resolver::resolve_signatures`] validates every signature element in
//!    a document against the candidate trust keys and builds a
//!    [`SignatureMap`] keyed by [`SignatureIdentity`].
//! 2. [`resolver::assign_signature`] re-derives the identity from the raw
//!    signature element that sits under a mapped domain object and attaches
//!    the validated record to it.
//!
//! Key identification is the ambiguous part: SAML signatures rarely name
//! their key, so [`keys::KeyLocator`] resolves a lone configured key
//! unconditionally and otherwise forces the verifier to trial every
//! candidate via [`keys::KeyCandidateIterator`].

pub mod keys;
pub mod resolver;
pub mod signer;
pub mod verifier;

use serde::{Deserialize, Serialize};

use crate::types::{canonicalization_algorithms, digest_algorithms, signature_algorithms};
use keys::TrustKey;

/// Signature algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// RSA with SHA-256 (interoperability baseline).
    #[default]
    RsaSha256,
    /// RSA with SHA-384.
    RsaSha384,
    /// RSA with SHA-512.
    RsaSha512,
    /// Legacy RSA with SHA-1 (parsed but never produced or verified).
    RsaSha1,
}

impl SignatureAlgorithm {
    /// Returns the URI for this signature algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::RsaSha256 => signature_algorithms::RSA_SHA256,
            Self::RsaSha384 => signature_algorithms::RSA_SHA384,
            Self::RsaSha512 => signature_algorithms::RSA_SHA512,
            Self::RsaSha1 => signature_algorithms::RSA_SHA1,
        }
    }

    /// Returns the corresponding digest algorithm.
    #[must_use]
    pub const fn digest(&self) -> DigestAlgorithm {
        match self {
            Self::RsaSha256 => DigestAlgorithm::Sha256,
            Self::RsaSha384 => DigestAlgorithm::Sha384,
            Self::RsaSha512 => DigestAlgorithm::Sha512,
            Self::RsaSha1 => DigestAlgorithm::Sha1,
        }
    }

    /// Parses a signature algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            signature_algorithms::RSA_SHA256 => Some(Self::RsaSha256),
            signature_algorithms::RSA_SHA384 => Some(Self::RsaSha384),
            signature_algorithms::RSA_SHA512 => Some(Self::RsaSha512),
            signature_algorithms::RSA_SHA1 => Some(Self::RsaSha1),
            _ => None,
        }
    }

    /// Returns true if this algorithm uses a deprecated hash (SHA-1).
    #[must_use]
    pub const fn is_deprecated(&self) -> bool {
        matches!(self, Self::RsaSha1)
    }
}

/// Digest algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// SHA-256.
    #[default]
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
    /// Legacy SHA-1 (parsed but never produced or verified).
    Sha1,
}

impl DigestAlgorithm {
    /// Returns the URI for this digest algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Sha256 => digest_algorithms::SHA256,
            Self::Sha384 => digest_algorithms::SHA384,
            Self::Sha512 => digest_algorithms::SHA512,
            Self::Sha1 => digest_algorithms::SHA1,
        }
    }

    /// Parses a digest algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            digest_algorithms::SHA256 => Some(Self::Sha256),
            digest_algorithms::SHA384 => Some(Self::Sha384),
            digest_algorithms::SHA512 => Some(Self::Sha512),
            digest_algorithms::SHA1 => Some(Self::Sha1),
            _ => None,
        }
    }
}

/// Canonicalization algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CanonicalizationAlgorithm {
    /// Exclusive C14N without comments.
    #[default]
    ExclusiveC14N,
    /// Exclusive C14N with comments.
    ExclusiveC14NWithComments,
    /// Inclusive C14N without comments.
    C14N,
    /// Inclusive C14N with comments.
    C14NWithComments,
}

impl CanonicalizationAlgorithm {
    /// Returns the URI for this canonicalization algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::ExclusiveC14N => canonicalization_algorithms::EXCLUSIVE_C14N,
            Self::ExclusiveC14NWithComments => {
                canonicalization_algorithms::EXCLUSIVE_C14N_WITH_COMMENTS
            }
            Self::C14N => canonicalization_algorithms::C14N,
            Self::C14NWithComments => canonicalization_algorithms::C14N_WITH_COMMENTS,
        }
    }

    /// Parses a canonicalization algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            canonicalization_algorithms::EXCLUSIVE_C14N => Some(Self::ExclusiveC14N),
            canonicalization_algorithms::EXCLUSIVE_C14N_WITH_COMMENTS => {
                Some(Self::ExclusiveC14NWithComments)
            }
            canonicalization_algorithms::C14N => Some(Self::C14N),
            canonicalization_algorithms::C14N_WITH_COMMENTS => Some(Self::C14NWithComments),
            _ => None,
        }
    }
}

/// A signature read from a `<ds:Signature>` element.
///
/// Extraction and validation are separate steps: the record is created with
/// `validated == false`, and the resolver flips it exactly once when a
/// trust key verifies the element, recording which key it was. The record
/// is never modified after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord {
    /// The canonicalization algorithm, when recognized.
    pub canonicalization: Option<CanonicalizationAlgorithm>,

    /// The digest algorithm, when recognized.
    pub digest_algorithm: Option<DigestAlgorithm>,

    /// The digest value (base64, whitespace stripped). Mandatory.
    pub digest_value: String,

    /// The signature algorithm, when recognized.
    pub signature_algorithm: Option<SignatureAlgorithm>,

    /// The signature value (base64, whitespace stripped). Mandatory.
    pub signature_value: String,

    /// Whether a trust key validated this signature.
    pub validated: bool,

    /// The trust key that validated this signature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validating_key: Option<TrustKey>,
}

impl SignatureRecord {
    /// Returns the identity key of this signature.
    #[must_use]
    pub fn identity(&self) -> SignatureIdentity {
        SignatureIdentity {
            signature_value: self.signature_value.clone(),
            digest_value: self.digest_value.clone(),
        }
    }
}

/// Identity of a signature, derived from its signature and digest values.
///
/// Two records describe the same signature iff their identities are equal;
/// this is the sole mechanism used to correlate a raw signature element
/// with a validated record, because element order and nesting cannot be
/// trusted once a document carries more than one signed element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureIdentity {
    signature_value: String,
    digest_value: String,
}

impl std::fmt::Display for SignatureIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Signature[sig={}; digest={}]",
            self.signature_value, self.digest_value
        )
    }
}

/// Validated signatures of one document, keyed by identity.
///
/// Insertion order is the order the signature elements appeared in the
/// document. Built once per resolution call and read-only afterwards.
#[derive(Debug, Default)]
pub struct SignatureMap {
    entries: Vec<(SignatureIdentity, SignatureRecord)>,
}

impl SignatureMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the map holds no signatures.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of validated signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if a signature with this identity was validated.
    #[must_use]
    pub fn contains(&self, identity: &SignatureIdentity) -> bool {
        self.entries.iter().any(|(id, _)| id == identity)
    }

    /// Looks up a validated signature by identity.
    #[must_use]
    pub fn get(&self, identity: &SignatureIdentity) -> Option<&SignatureRecord> {
        self.entries
            .iter()
            .find(|(id, _)| id == identity)
            .map(|(_, record)| record)
    }

    /// Inserts a validated signature.
    pub fn insert(&mut self, identity: SignatureIdentity, record: SignatureRecord) {
        self.entries.push((identity, record));
    }

    /// Iterates entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&SignatureIdentity, &SignatureRecord)> {
        self.entries.iter().map(|(id, record)| (id, record))
    }
}

/// Signing configuration attached to a domain object.
///
/// Presence of a signing key on an object makes [`crate::serialize_document`]
/// emit a signed document; absence yields unsigned output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningKey {
    /// PEM-encoded RSA private key (PKCS#1 or PKCS#8).
    pub private_key_pem: String,

    /// PEM-encoded certificate to embed in the signature's KeyInfo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_pem: Option<String>,

    /// The signature algorithm to use.
    pub algorithm: SignatureAlgorithm,

    /// The canonicalization algorithm to declare.
    pub canonicalization: CanonicalizationAlgorithm,
}

impl SigningKey {
    /// Creates a signing key with the default algorithm suite.
    #[must_use]
    pub fn new(private_key_pem: impl Into<String>) -> Self {
        Self {
            private_key_pem: private_key_pem.into(),
            certificate_pem: None,
            algorithm: SignatureAlgorithm::RsaSha256,
            canonicalization: CanonicalizationAlgorithm::ExclusiveC14N,
        }
    }

    /// Sets the certificate to embed in signatures.
    #[must_use]
    pub fn with_certificate(mut self, certificate_pem: impl Into<String>) -> Self {
        self.certificate_pem = Some(certificate_pem.into());
        self
    }
}

/// An object that may carry a verified signature.
pub trait Signable {
    /// The signature attached to this object, if any.
    fn signature(&self) -> Option<&SignatureRecord>;

    /// Attaches a signature record. Called at most once, at mapping time.
    fn set_signature(&mut self, record: SignatureRecord);
}

/// Whitespace-normalizing canonical form.
///
/// Both the signer and the verifier run signed content through this before
/// digesting, so documents produced by this library round-trip. This is a
/// C14N subset: it does not reorder attributes or rewrite namespace
/// declarations.
pub(crate) fn canonicalize(xml: &str) -> String {
    xml.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds the `<ds:SignedInfo>` element both signing and verification
/// operate on. One template keeps the two byte-identical.
pub(crate) fn build_signed_info(
    reference_uri: &str,
    digest_b64: &str,
    signature_algorithm_uri: &str,
    canonicalization_uri: &str,
    digest_algorithm_uri: &str,
) -> String {
    format!(
        r#"<ds:SignedInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
<ds:CanonicalizationMethod Algorithm="{}"/>
<ds:SignatureMethod Algorithm="{}"/>
<ds:Reference URI="{}">
<ds:Transforms>
<ds:Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/>
<ds:Transform Algorithm="{}"/>
</ds:Transforms>
<ds:DigestMethod Algorithm="{}"/>
<ds:DigestValue>{}</ds:DigestValue>
</ds:Reference>
</ds:SignedInfo>"#,
        canonicalization_uri,
        signature_algorithm_uri,
        reference_uri,
        canonicalization_uri,
        digest_algorithm_uri,
        digest_b64
    )
}
