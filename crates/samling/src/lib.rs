//! SAML 2.0 document resolution with XML signature trust resolution.
//!
//! This crate maps SAML 2.0 protocol documents (metadata, authentication
//! requests, assertions) between their wire-format XML and a typed domain
//! model, and verifies the XML digital signatures that establish trust in
//! those documents.
//!
//! # Architecture
//!
//! - [`types`] - the SAML domain model and wire-format constants
//! - [`signature`] - signature extraction, trust resolution, correlation,
//!   and signing
//! - [`mapper`] - structural translation between XML and domain objects
//! - [`error`] - error types for SAML operations
//!
//! # Trust model
//!
//! A document can carry any number of signatures (a metadata aggregate
//! signs each entity independently). [`resolve_document`] validates every
//! signature against the caller's trust keys and pairs each signed domain
//! object with exactly the signature that covers it, keyed by the
//! signature's own identity rather than its position in the document.
//! Resolution fails closed: one unverifiable signature rejects the whole
//! document. With no trust keys configured, signatures are not checked and
//! no object is marked validated.
//!
//! # Example
//!
//! ```rust,ignore
//! use samling::{resolve_document, SamlObject, TrustKey};
//!
//! let keys = vec![TrustKey::new(idp_certificate_pem)];
//! match resolve_document(&xml_bytes, &keys)? {
//!     SamlObject::AuthnRequest(request) => {
//!         assert!(request.signature.is_some_and(|s| s.validated));
//!     }
//!     other => return Err(unexpected(other)),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod mapper;
pub mod signature;
pub mod types;

pub use error::{SamlError, SamlResult};
pub use signature::keys::TrustKey;
pub use signature::{Signable, SignatureMap, SignatureRecord, SigningKey};
pub use types::SamlObject;

use samling_xml::XmlDocument;
use signature::resolver::resolve_signatures;
use signature::verifier::{DsigVerifier, SignatureVerifier};

/// Parses a SAML document, validates its signatures against the trusted
/// keys, and maps it to a domain object.
///
/// Each signable element in the result carries the validated signature
/// that covers it, or none when the element was unsigned (or no trust keys
/// were supplied). Callers decide whether an unsigned object is acceptable
/// for their flow.
pub fn resolve_document(xml: &[u8], trusted_keys: &[TrustKey]) -> SamlResult<SamlObject> {
    resolve_document_with(xml, trusted_keys, &DsigVerifier::new())
}

/// [`resolve_document`] with a caller-supplied signature verification
/// primitive.
pub fn resolve_document_with(
    xml: &[u8],
    trusted_keys: &[TrustKey],
    verifier: &dyn SignatureVerifier,
) -> SamlResult<SamlObject> {
    let doc = XmlDocument::parse_bytes(xml)?;
    let tree = doc.tree()?;
    let signature_map = resolve_signatures(&doc, &tree, trusted_keys, verifier)?;
    mapper::read_document(&tree, &signature_map)
}

/// Serializes a domain object to XML.
///
/// Objects carrying a signing key produce signed documents; an absent key
/// produces unsigned output, which is not an error.
pub fn serialize_document(object: &SamlObject) -> SamlResult<String> {
    mapper::write_document(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::SigningKey;
    use crate::types::{Metadata, Provider, SamlBinding, SpDescriptor};

    const KEY_1: &str = include_str!("../testdata/key1.pem");
    const CERT_1: &str = include_str!("../testdata/cert1.pem");
    const KEY_2: &str = include_str!("../testdata/key2.pem");
    const CERT_2: &str = include_str!("../testdata/cert2.pem");

    fn signed_request(key_pem: &str, cert_pem: &str) -> SamlObject {
        let request = types::AuthnRequest::with_id("_req1", "https://sp.example.com")
            .with_acs_url("https://sp.example.com/acs")
            .with_destination("https://idp.example.com/sso")
            .with_binding(SamlBinding::HttpPost)
            .with_signing_key(SigningKey::new(key_pem).with_certificate(cert_pem));
        SamlObject::AuthnRequest(request)
    }

    #[test]
    fn signed_request_resolves_with_matching_trust_key() {
        let xml = serialize_document(&signed_request(KEY_1, CERT_1)).unwrap();
        let keys = vec![TrustKey::new(CERT_1).with_name("idp-one")];

        let resolved = resolve_document(xml.as_bytes(), &keys).unwrap();
        let SamlObject::AuthnRequest(request) = resolved else {
            panic!("expected an AuthnRequest");
        };
        let signature = request.signature.expect("signature attached");
        assert!(signature.validated);
        assert_eq!(signature.validating_key.as_ref(), Some(&keys[0]));
    }

    #[test]
    fn signed_request_fails_with_wrong_trust_key() {
        let xml = serialize_document(&signed_request(KEY_1, CERT_1)).unwrap();
        let keys = vec![TrustKey::new(CERT_2)];

        let err = resolve_document(xml.as_bytes(), &keys).unwrap_err();
        assert!(matches!(err, SamlError::SignatureValidation(_)));
    }

    #[test]
    fn correct_key_is_discovered_among_candidates() {
        let xml = serialize_document(&signed_request(KEY_1, CERT_1)).unwrap();
        // the signing key's certificate is second in the candidate list
        let keys = vec![TrustKey::new(CERT_2), TrustKey::new(CERT_1)];

        let resolved = resolve_document(xml.as_bytes(), &keys).unwrap();
        let SamlObject::AuthnRequest(request) = resolved else {
            panic!("expected an AuthnRequest");
        };
        let signature = request.signature.expect("signature attached");
        assert_eq!(signature.validating_key.as_ref(), Some(&keys[1]));
    }

    #[test]
    fn tampered_signature_rejects_the_document() {
        let xml = serialize_document(&signed_request(KEY_1, CERT_1)).unwrap();

        let start = xml.find("<ds:SignatureValue>").unwrap() + "<ds:SignatureValue>".len();
        let mut tampered = xml.clone();
        let original = tampered.as_bytes()[start];
        let replacement = if original == b'A' { "B" } else { "A" };
        tampered.replace_range(start..=start, replacement);

        let err = resolve_document(tampered.as_bytes(), &[TrustKey::new(CERT_1)]).unwrap_err();
        assert!(matches!(err, SamlError::SignatureValidation(_)));
    }

    #[test]
    fn empty_trust_key_list_skips_signature_checks() {
        let xml = serialize_document(&signed_request(KEY_1, CERT_1)).unwrap();

        let resolved = resolve_document(xml.as_bytes(), &[]).unwrap();
        let SamlObject::AuthnRequest(request) = resolved else {
            panic!("expected an AuthnRequest");
        };
        // nothing was validated, so nothing is attached
        assert!(request.signature.is_none());
    }

    #[test]
    fn aggregate_with_two_independently_signed_entities() {
        let entity = |id: &str, entity_id: &str, key: &str, cert: &str| Metadata {
            id: Some(id.to_string()),
            entity_id: entity_id.to_string(),
            entity_alias: None,
            valid_until: None,
            cache_duration: None,
            providers: vec![Provider::ServiceProvider(SpDescriptor::default())],
            signature: None,
            signing_key: Some(SigningKey::new(key).with_certificate(cert)),
        };
        let collection = types::EntitiesCollection {
            id: Some("_agg".to_string()),
            name: None,
            entities: vec![
                entity("_ent1", "https://one.example.com", KEY_1, CERT_1),
                entity("_ent2", "https://two.example.com", KEY_2, CERT_2),
            ],
            signature: None,
        };

        let xml = serialize_document(&SamlObject::EntitiesCollection(collection)).unwrap();
        let keys = vec![TrustKey::new(CERT_1), TrustKey::new(CERT_2)];

        let resolved = resolve_document(xml.as_bytes(), &keys).unwrap();
        let SamlObject::EntitiesCollection(collection) = resolved else {
            panic!("expected an EntitiesCollection");
        };

        assert_eq!(collection.entities.len(), 2);
        let first = collection.entities[0].signature.as_ref().expect("entity 1 signed");
        let second = collection.entities[1].signature.as_ref().expect("entity 2 signed");
        assert!(first.validated && second.validated);
        // each entity correlates with the signature made by its own key
        assert_eq!(first.validating_key.as_ref(), Some(&keys[0]));
        assert_eq!(second.validating_key.as_ref(), Some(&keys[1]));
        assert_ne!(first.signature_value, second.signature_value);
    }

    #[test]
    fn aggregate_fails_closed_when_one_entity_key_is_untrusted() {
        let entity = |id: &str, entity_id: &str, key: &str, cert: &str| Metadata {
            id: Some(id.to_string()),
            entity_id: entity_id.to_string(),
            entity_alias: None,
            valid_until: None,
            cache_duration: None,
            providers: vec![],
            signature: None,
            signing_key: Some(SigningKey::new(key).with_certificate(cert)),
        };
        let collection = types::EntitiesCollection {
            id: None,
            name: None,
            entities: vec![
                entity("_ent1", "https://one.example.com", KEY_1, CERT_1),
                entity("_ent2", "https://two.example.com", KEY_2, CERT_2),
            ],
            signature: None,
        };

        let xml = serialize_document(&SamlObject::EntitiesCollection(collection)).unwrap();
        // only the first entity's key is trusted
        let err = resolve_document(xml.as_bytes(), &[TrustKey::new(CERT_1)]).unwrap_err();
        assert!(matches!(err, SamlError::SignatureValidation(_)));
    }

    #[test]
    fn signed_metadata_document_round_trips_trust() {
        let metadata = Metadata::new("https://idp.example.com")
            .with_id("_m1")
            .with_provider(Provider::ServiceProvider(SpDescriptor::default()))
            .with_signing_key(SigningKey::new(KEY_1).with_certificate(CERT_1));

        let xml = serialize_document(&SamlObject::Metadata(metadata)).unwrap();
        let resolved = resolve_document(xml.as_bytes(), &[TrustKey::new(CERT_1)]).unwrap();

        let SamlObject::Metadata(metadata) = resolved else {
            panic!("expected Metadata");
        };
        assert!(metadata.signature.expect("signature attached").validated);
    }
}
