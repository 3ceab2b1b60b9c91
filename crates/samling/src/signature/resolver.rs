//! Signature resolution and object correlation.
//!
//! [`resolve_signatures`] walks every `<ds:Signature>` element of a parsed
//! document, validates each against the candidate trust keys, and builds
//! the identity-keyed [`SignatureMap`] for the document.
//! [`assign_signature`] then pairs mapped domain objects with their
//! validated records by identity, never by position.
//!
//! Resolution is fail-closed: one unverifiable signature aborts the whole
//! document. A document with a forged or non-verifying signature must not
//! yield a domain graph a caller could mistake for trusted.

use samling_xml::{child_attribute, child_text, find_child_element, find_elements, XmlDocument};

use crate::error::{SamlError, SamlResult};
use crate::types::XMLDSIG_NS;

use super::keys::{decode_candidates, KeyLocator, TrustKey};
use super::verifier::SignatureVerifier;
use super::{
    CanonicalizationAlgorithm, DigestAlgorithm, Signable, SignatureAlgorithm, SignatureMap,
    SignatureRecord,
};

/// Reads a `<ds:Signature>` element into an unvalidated [`SignatureRecord`].
///
/// Algorithm URIs are tolerated missing or unrecognized (the field stays
/// unset), but the digest and signature values are mandatory: without them
/// no usable identity exists.
pub fn extract_signature(node: roxmltree::Node<'_, '_>) -> SamlResult<SignatureRecord> {
    let digest_value = child_text(node, XMLDSIG_NS, "DigestValue")
        .map(strip_whitespace)
        .ok_or_else(|| SamlError::MalformedSignature("DigestValue missing".to_string()))?;
    let signature_value = child_text(node, XMLDSIG_NS, "SignatureValue")
        .map(strip_whitespace)
        .ok_or_else(|| SamlError::MalformedSignature("SignatureValue missing".to_string()))?;

    let canonicalization =
        child_attribute(node, XMLDSIG_NS, "CanonicalizationMethod", "Algorithm")
            .as_deref()
            .and_then(CanonicalizationAlgorithm::from_uri);
    let digest_algorithm = child_attribute(node, XMLDSIG_NS, "DigestMethod", "Algorithm")
        .as_deref()
        .and_then(DigestAlgorithm::from_uri);
    let signature_algorithm = child_attribute(node, XMLDSIG_NS, "SignatureMethod", "Algorithm")
        .as_deref()
        .and_then(SignatureAlgorithm::from_uri);

    Ok(SignatureRecord {
        canonicalization,
        digest_algorithm,
        digest_value,
        signature_algorithm,
        signature_value,
        validated: false,
        validating_key: None,
    })
}

/// Validates every signature element of a document against the candidate
/// trust keys.
///
/// - An empty key list short-circuits to an empty map: no trust configured
///   means nothing is checked, and callers decide separately whether an
///   unverified document is acceptable.
/// - A document without signatures yields an empty map.
/// - Every found signature must validate against some candidate, otherwise
///   the whole resolution fails with
///   [`SamlError::SignatureValidation`].
pub fn resolve_signatures(
    doc: &XmlDocument,
    tree: &roxmltree::Document<'_>,
    trusted_keys: &[TrustKey],
    verifier: &dyn SignatureVerifier,
) -> SamlResult<SignatureMap> {
    if trusted_keys.is_empty() {
        return Ok(SignatureMap::new());
    }

    let signature_nodes = find_elements(tree, XMLDSIG_NS, "Signature");
    if signature_nodes.is_empty() {
        return Ok(SignatureMap::new());
    }

    let candidates = decode_candidates(trusted_keys)?;
    let mut map = SignatureMap::new();

    for node in signature_nodes {
        let mut locator = KeyLocator::new(&candidates);
        let ok = verifier.verify(doc, tree, node, &mut locator)?;
        if !ok {
            tracing::warn!(
                keys = trusted_keys.len(),
                "signature did not validate against any candidate key"
            );
            return Err(SamlError::SignatureValidation(format!(
                "unable to validate signature using {} candidate keys",
                trusted_keys.len()
            )));
        }

        let index = locator.current_index().ok_or_else(|| {
            SamlError::SignatureValidation(
                "verifier reported success without selecting a key".to_string(),
            )
        })?;

        let mut record = extract_signature(node)?;
        record.validated = true;
        record.validating_key = Some(trusted_keys[index].clone());

        let identity = record.identity();
        if map.contains(&identity) {
            // A colliding signature+digest pair within one document is
            // either a duplicated or a forged element.
            return Err(SamlError::SignatureValidation(format!(
                "duplicate signature identity in document: {identity}"
            )));
        }
        tracing::debug!(key_index = index, "signature validated");
        map.insert(identity, record);
    }

    Ok(map)
}

/// Attaches the validated signature covering `signature_element` to a
/// domain object.
///
/// An absent element leaves the object unsigned, which is not an error.
/// The record is re-extracted for identity purposes only and looked up in
/// the map built by [`resolve_signatures`]; an identity miss also leaves
/// the object unsigned rather than synthesizing a record.
pub fn assign_signature<T: Signable>(
    map: &SignatureMap,
    object: &mut T,
    signature_element: Option<roxmltree::Node<'_, '_>>,
) -> SamlResult<()> {
    let Some(element) = signature_element else {
        return Ok(());
    };

    let record = extract_signature(element)?;
    if let Some(validated) = map.get(&record.identity()) {
        object.set_signature(validated.clone());
    }
    Ok(())
}

/// Finds the direct `<ds:Signature>` child of an element, if any.
#[must_use]
pub fn own_signature_element<'a>(
    parent: roxmltree::Node<'a, 'a>,
) -> Option<roxmltree::Node<'a, 'a>> {
    find_child_element(parent, XMLDSIG_NS, "Signature")
}

fn strip_whitespace(s: String) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::keys::KeyCandidateIterator;

    const CERT_1: &str = include_str!("../../testdata/cert1.pem");
    const CERT_2: &str = include_str!("../../testdata/cert2.pem");

    /// Verifier stub that validates a signature when its SignatureValue is
    /// paired with a given candidate index, honoring the locator contract.
    struct StubVerifier {
        accepted: Vec<(&'static str, usize)>,
    }

    impl StubVerifier {
        fn accepting(accepted: Vec<(&'static str, usize)>) -> Self {
            Self { accepted }
        }

        fn validates(&self, sig_value: &str, index: usize) -> bool {
            self.accepted
                .iter()
                .any(|(value, idx)| *value == sig_value && *idx == index)
        }
    }

    impl SignatureVerifier for StubVerifier {
        fn verify(
            &self,
            _doc: &XmlDocument,
            _tree: &roxmltree::Document<'_>,
            signature: roxmltree::Node<'_, '_>,
            locator: &mut KeyLocator<'_>,
        ) -> SamlResult<bool> {
            let sig_value = child_text(signature, XMLDSIG_NS, "SignatureValue").unwrap_or_default();

            if locator.resolve(None).is_some() {
                return Ok(self.validates(&sig_value, 0));
            }

            let iter: &mut KeyCandidateIterator<'_> = locator.candidates();
            loop {
                if iter.next_key().is_err() {
                    return Ok(false);
                }
                let index = iter.current_index().expect("key was handed out");
                if self.validates(&sig_value, index) {
                    return Ok(true);
                }
            }
        }
    }

    struct TestObject {
        signature: Option<SignatureRecord>,
    }

    impl Signable for TestObject {
        fn signature(&self) -> Option<&SignatureRecord> {
            self.signature.as_ref()
        }

        fn set_signature(&mut self, record: SignatureRecord) {
            self.signature = Some(record);
        }
    }

    fn trust_keys(n: usize) -> Vec<TrustKey> {
        (0..n)
            .map(|i| {
                let cert = if i % 2 == 0 { CERT_1 } else { CERT_2 };
                TrustKey::new(cert).with_name(format!("key-{i}"))
            })
            .collect()
    }

    fn signature_block(sig: &str, digest: &str) -> String {
        format!(
            "<ds:Signature><ds:SignedInfo><ds:DigestValue>{digest}</ds:DigestValue></ds:SignedInfo><ds:SignatureValue>{sig}</ds:SignatureValue></ds:Signature>"
        )
    }

    fn single_signed_doc(sig: &str, digest: &str) -> XmlDocument {
        let xml = format!(
            r#"<m:EntityDescriptor xmlns:m="urn:oasis:names:tc:SAML:2.0:metadata" xmlns:ds="http://www.w3.org/2000/09/xmldsig#" ID="_e1" entityID="https://one.example.com">{}</m:EntityDescriptor>"#,
            signature_block(sig, digest)
        );
        XmlDocument::parse(xml).unwrap()
    }

    fn double_signed_doc() -> XmlDocument {
        let xml = format!(
            r#"<m:EntitiesDescriptor xmlns:m="urn:oasis:names:tc:SAML:2.0:metadata" xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><m:EntityDescriptor ID="_e1" entityID="https://one.example.com">{}</m:EntityDescriptor><m:EntityDescriptor ID="_e2" entityID="https://two.example.com">{}</m:EntityDescriptor></m:EntitiesDescriptor>"#,
            signature_block("sig-one", "dig-one"),
            signature_block("sig-two", "dig-two")
        );
        XmlDocument::parse(xml).unwrap()
    }

    #[test]
    fn extract_reads_values_and_tolerates_missing_algorithms() {
        let doc = single_signed_doc("c2ln", "ZGln");
        let tree = doc.tree().unwrap();
        let node = find_elements(&tree, XMLDSIG_NS, "Signature")[0];

        let record = extract_signature(node).unwrap();
        assert_eq!(record.signature_value, "c2ln");
        assert_eq!(record.digest_value, "ZGln");
        assert!(record.signature_algorithm.is_none());
        assert!(record.canonicalization.is_none());
        assert!(!record.validated);
        assert!(record.validating_key.is_none());
    }

    #[test]
    fn extract_requires_digest_and_signature_values() {
        let xml = r#"<Root xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:Signature><ds:SignatureValue>abc</ds:SignatureValue></ds:Signature></Root>"#;
        let doc = XmlDocument::parse(xml.to_string()).unwrap();
        let tree = doc.tree().unwrap();
        let node = find_elements(&tree, XMLDSIG_NS, "Signature")[0];

        let err = extract_signature(node).unwrap_err();
        assert!(matches!(err, SamlError::MalformedSignature(_)));
    }

    #[test]
    fn empty_key_list_skips_validation() {
        let doc = single_signed_doc("sig", "dig");
        let tree = doc.tree().unwrap();
        let verifier = StubVerifier::accepting(vec![]);

        let map = resolve_signatures(&doc, &tree, &[], &verifier).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn unsigned_document_yields_empty_map() {
        let xml = r#"<m:EntityDescriptor xmlns:m="urn:oasis:names:tc:SAML:2.0:metadata" entityID="https://one.example.com"/>"#;
        let doc = XmlDocument::parse(xml.to_string()).unwrap();
        let tree = doc.tree().unwrap();
        let verifier = StubVerifier::accepting(vec![]);

        let map = resolve_signatures(&doc, &tree, &trust_keys(2), &verifier).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn correct_key_is_found_regardless_of_position() {
        for index in 0..3 {
            let doc = single_signed_doc("sig", "dig");
            let tree = doc.tree().unwrap();
            let keys = trust_keys(3);
            let verifier = StubVerifier::accepting(vec![("sig", index)]);

            let map = resolve_signatures(&doc, &tree, &keys, &verifier).unwrap();
            assert_eq!(map.len(), 1);
            let (_, record) = map.iter().next().unwrap();
            assert!(record.validated);
            assert_eq!(record.validating_key.as_ref(), Some(&keys[index]));
        }
    }

    #[test]
    fn second_key_signs_reports_index_one() {
        let doc = single_signed_doc("sig", "dig");
        let tree = doc.tree().unwrap();
        let keys = trust_keys(2);
        let verifier = StubVerifier::accepting(vec![("sig", 1)]);

        let map = resolve_signatures(&doc, &tree, &keys, &verifier).unwrap();
        assert_eq!(map.len(), 1);
        let (_, record) = map.iter().next().unwrap();
        assert_eq!(record.validating_key.as_ref(), Some(&keys[1]));
    }

    #[test]
    fn single_key_fast_path_validates() {
        let doc = single_signed_doc("sig", "dig");
        let tree = doc.tree().unwrap();
        let keys = trust_keys(1);
        // accepted only at index 0, reached through the resolve() fast path
        let verifier = StubVerifier::accepting(vec![("sig", 0)]);

        let map = resolve_signatures(&doc, &tree, &keys, &verifier).unwrap();
        let (_, record) = map.iter().next().unwrap();
        assert_eq!(record.validating_key.as_ref(), Some(&keys[0]));
    }

    #[test]
    fn unverifiable_signature_fails_the_document() {
        let doc = single_signed_doc("sig-tampered", "dig");
        let tree = doc.tree().unwrap();
        let verifier = StubVerifier::accepting(vec![("sig-original", 0)]);

        let err = resolve_signatures(&doc, &tree, &trust_keys(2), &verifier).unwrap_err();
        match err {
            SamlError::SignatureValidation(msg) => assert!(msg.contains("2 candidate keys")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn two_signed_elements_resolve_to_two_entries() {
        let doc = double_signed_doc();
        let tree = doc.tree().unwrap();
        let keys = trust_keys(2);
        let verifier = StubVerifier::accepting(vec![("sig-one", 0), ("sig-two", 1)]);

        let map = resolve_signatures(&doc, &tree, &keys, &verifier).unwrap();
        assert_eq!(map.len(), 2);

        let records: Vec<_> = map.iter().map(|(_, r)| r).collect();
        assert_eq!(records[0].signature_value, "sig-one");
        assert_eq!(records[0].validating_key.as_ref(), Some(&keys[0]));
        assert_eq!(records[1].signature_value, "sig-two");
        assert_eq!(records[1].validating_key.as_ref(), Some(&keys[1]));
    }

    #[test]
    fn one_bad_entity_fails_the_aggregate() {
        let doc = double_signed_doc();
        let tree = doc.tree().unwrap();
        // only the first entity's signature validates
        let verifier = StubVerifier::accepting(vec![("sig-one", 0)]);

        let err = resolve_signatures(&doc, &tree, &trust_keys(2), &verifier).unwrap_err();
        assert!(matches!(err, SamlError::SignatureValidation(_)));
    }

    #[test]
    fn duplicate_signature_identity_is_a_hard_error() {
        let xml = format!(
            r#"<m:EntitiesDescriptor xmlns:m="urn:oasis:names:tc:SAML:2.0:metadata" xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><m:EntityDescriptor ID="_e1" entityID="https://one.example.com">{s}</m:EntityDescriptor><m:EntityDescriptor ID="_e2" entityID="https://two.example.com">{s}</m:EntityDescriptor></m:EntitiesDescriptor>"#,
            s = signature_block("same-sig", "same-dig")
        );
        let doc = XmlDocument::parse(xml).unwrap();
        let tree = doc.tree().unwrap();
        let verifier = StubVerifier::accepting(vec![("same-sig", 0)]);

        let err = resolve_signatures(&doc, &tree, &trust_keys(2), &verifier).unwrap_err();
        match err {
            SamlError::SignatureValidation(msg) => assert!(msg.contains("duplicate")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn correlation_is_identity_based_not_positional() {
        let doc = double_signed_doc();
        let tree = doc.tree().unwrap();
        let keys = trust_keys(2);
        let verifier = StubVerifier::accepting(vec![("sig-one", 0), ("sig-two", 1)]);
        let map = resolve_signatures(&doc, &tree, &keys, &verifier).unwrap();

        // walk entities in reverse document order to prove position is
        // irrelevant
        let entities = find_elements(&tree, "urn:oasis:names:tc:SAML:2.0:metadata", "EntityDescriptor");
        for entity in entities.iter().rev() {
            let mut object = TestObject { signature: None };
            assign_signature(&map, &mut object, own_signature_element(*entity)).unwrap();

            let record = object.signature.expect("signature attached");
            let expected = if entity.attribute("ID") == Some("_e1") {
                "sig-one"
            } else {
                "sig-two"
            };
            assert_eq!(record.signature_value, expected);
            assert!(record.validated);
        }
    }

    #[test]
    fn absent_signature_element_leaves_object_unsigned() {
        let map = SignatureMap::new();
        let mut object = TestObject { signature: None };
        assign_signature(&map, &mut object, None).unwrap();
        assert!(object.signature.is_none());
    }

    #[test]
    fn unknown_identity_is_not_synthesized() {
        let doc = single_signed_doc("sig-unknown", "dig-unknown");
        let tree = doc.tree().unwrap();
        let node = find_elements(&tree, XMLDSIG_NS, "Signature")[0];

        let map = SignatureMap::new();
        let mut object = TestObject { signature: None };
        assign_signature(&map, &mut object, Some(node)).unwrap();
        assert!(object.signature.is_none());
    }
}
