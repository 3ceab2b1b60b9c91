//! Enveloped XML signature creation.
//!
//! Serialized documents that carry a signing key are signed here: the
//! target element is digested in canonical form, a `<ds:SignedInfo>` is
//! built and signed with the configured RSA key, and the resulting
//! `<ds:Signature>` is inserted into the element — after the `<saml:Issuer>`
//! child when one exists (schema position for protocol messages), else as
//! the first child.

use base64::Engine;

use samling_xml::{find_child_element, XmlDocument};

use crate::error::{SamlError, SamlResult};
use crate::types::{SAML_NS, XMLDSIG_NS};

use super::{build_signed_info, canonicalize, DigestAlgorithm, SignatureAlgorithm, SigningKey};

/// Signs XML documents with a configured key.
pub struct XmlSigner<'a> {
    key: &'a SigningKey,
}

impl<'a> XmlSigner<'a> {
    /// Creates a signer for the given key.
    #[must_use]
    pub fn new(key: &'a SigningKey) -> Self {
        Self { key }
    }

    /// Signs the element identified by `reference_id` inside `xml`,
    /// returning the document with a `<ds:Signature>` inserted.
    pub fn sign(&self, xml: &str, reference_id: &str) -> SamlResult<String> {
        let doc = XmlDocument::parse(xml.to_string())
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;
        let tree = doc
            .tree()
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;

        let id_map = XmlDocument::build_id_map(&tree, &["ID", "Id", "id"]);
        let element = XmlDocument::find_by_id(&tree, &id_map, reference_id).ok_or_else(|| {
            SamlError::SignatureCreation(format!("element '{reference_id}' not found"))
        })?;

        let range = element.range();
        let element_xml = &xml[range.start..range.end];

        // Digest the element as it stands; verification splices the
        // inserted signature back out before recomputing.
        let canonical = canonicalize(element_xml);
        let digest = digest_bytes(canonical.as_bytes(), self.key.algorithm.digest())?;
        let digest_b64 = base64::engine::general_purpose::STANDARD.encode(&digest);

        let reference_uri = format!("#{reference_id}");
        let signed_info = build_signed_info(
            &reference_uri,
            &digest_b64,
            self.key.algorithm.uri(),
            self.key.canonicalization.uri(),
            self.key.algorithm.digest().uri(),
        );
        let canonical_signed_info = canonicalize(&signed_info);

        let signature_b64 = base64::engine::general_purpose::STANDARD
            .encode(self.sign_data(canonical_signed_info.as_bytes())?);

        let signature_element = self.build_signature_element(&signed_info, &signature_b64)?;

        let insert_at = insertion_position(xml, element)?;
        let mut result = String::with_capacity(xml.len() + signature_element.len());
        result.push_str(&xml[..insert_at]);
        result.push_str(&signature_element);
        result.push_str(&xml[insert_at..]);
        Ok(result)
    }

    fn sign_data(&self, data: &[u8]) -> SamlResult<Vec<u8>> {
        let key_der = samling_crypto::pem_to_der(&self.key.private_key_pem, "PRIVATE KEY")
            .or_else(|| samling_crypto::pem_to_der(&self.key.private_key_pem, "RSA PRIVATE KEY"))
            .ok_or_else(|| {
                SamlError::SignatureCreation("signing key is not a PEM private key".to_string())
            })?;

        let algorithm = match self.key.algorithm {
            SignatureAlgorithm::RsaSha256 => samling_crypto::RsaAlgorithm::Sha256,
            SignatureAlgorithm::RsaSha384 => samling_crypto::RsaAlgorithm::Sha384,
            SignatureAlgorithm::RsaSha512 => samling_crypto::RsaAlgorithm::Sha512,
            SignatureAlgorithm::RsaSha1 => {
                return Err(SamlError::SignatureCreation(
                    "refusing to produce a SHA-1 signature".to_string(),
                ));
            }
        };

        samling_crypto::rsa_sign(&key_der, data, algorithm)
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))
    }

    fn build_signature_element(
        &self,
        signed_info: &str,
        signature_b64: &str,
    ) -> SamlResult<String> {
        let key_info = match &self.key.certificate_pem {
            Some(pem) => {
                let der = samling_crypto::pem_to_der(pem, "CERTIFICATE").ok_or_else(|| {
                    SamlError::SignatureCreation(
                        "signing certificate is not a PEM certificate".to_string(),
                    )
                })?;
                let cert_b64 = base64::engine::general_purpose::STANDARD.encode(&der);
                format!(
                    "<ds:KeyInfo><ds:X509Data><ds:X509Certificate>{cert_b64}</ds:X509Certificate></ds:X509Data></ds:KeyInfo>"
                )
            }
            None => String::new(),
        };

        Ok(format!(
            r#"<ds:Signature xmlns:ds="{XMLDSIG_NS}">{signed_info}<ds:SignatureValue>{signature_b64}</ds:SignatureValue>{key_info}</ds:Signature>"#
        ))
    }
}

/// Where to splice the signature into the element: after an Issuer child
/// if present, else directly after the start tag.
fn insertion_position(xml: &str, element: roxmltree::Node<'_, '_>) -> SamlResult<usize> {
    if let Some(issuer) = find_child_element(element, SAML_NS, "Issuer") {
        return Ok(issuer.range().end);
    }

    let start = element.range().start;
    let tag_end = end_of_start_tag(&xml[start..]).ok_or_else(|| {
        SamlError::SignatureCreation("malformed start tag on signed element".to_string())
    })?;
    if xml[start..].as_bytes()[tag_end - 1] == b'/' {
        return Err(SamlError::SignatureCreation(
            "cannot insert a signature into a self-closing element".to_string(),
        ));
    }
    Ok(start + tag_end + 1)
}

/// Index of the `>` closing the start tag, quote-aware.
fn end_of_start_tag(s: &str) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, b) in s.bytes().enumerate() {
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn digest_bytes(data: &[u8], algorithm: DigestAlgorithm) -> SamlResult<Vec<u8>> {
    match algorithm {
        DigestAlgorithm::Sha256 => Ok(samling_crypto::sha256(data)),
        DigestAlgorithm::Sha384 => Ok(samling_crypto::sha384(data)),
        DigestAlgorithm::Sha512 => Ok(samling_crypto::sha512(data)),
        DigestAlgorithm::Sha1 => Err(SamlError::SignatureCreation(
            "refusing to produce a SHA-1 digest".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::keys::{decode_candidates, KeyLocator, TrustKey};
    use crate::signature::verifier::{DsigVerifier, SignatureVerifier};

    const KEY_PEM: &str = include_str!("../../testdata/key1.pem");
    const CERT_PEM: &str = include_str!("../../testdata/cert1.pem");
    const OTHER_CERT_PEM: &str = include_str!("../../testdata/cert2.pem");

    const REQUEST: &str = r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_req1" Version="2.0" IssueInstant="2024-05-01T10:00:00.000Z"><saml:Issuer>https://sp.example.com</saml:Issuer><samlp:NameIDPolicy AllowCreate="true"/></samlp:AuthnRequest>"#;

    fn signing_key() -> SigningKey {
        SigningKey::new(KEY_PEM).with_certificate(CERT_PEM)
    }

    fn verify_with(xml: &str, cert: &str) -> bool {
        let doc = XmlDocument::parse(xml.to_string()).unwrap();
        let tree = doc.tree().unwrap();
        let signature = samling_xml::find_elements(&tree, XMLDSIG_NS, "Signature")[0];
        let keys = decode_candidates(&[TrustKey::new(cert)]).unwrap();
        let mut locator = KeyLocator::new(&keys);
        DsigVerifier::new()
            .verify(&doc, &tree, signature, &mut locator)
            .unwrap_or(false)
    }

    #[test]
    fn signed_output_structure() {
        let key = signing_key();
        let signed = XmlSigner::new(&key).sign(REQUEST, "_req1").unwrap();

        assert!(signed.contains("<ds:Signature"));
        assert!(signed.contains(r##"URI="#_req1""##));
        assert!(signed.contains("<ds:SignatureValue>"));
        assert!(signed.contains("<ds:X509Certificate>"));
        // inserted after the Issuer element
        let issuer_end = signed.find("</saml:Issuer>").unwrap() + "</saml:Issuer>".len();
        assert_eq!(signed[issuer_end..].find("<ds:Signature"), Some(0));
    }

    #[test]
    fn sign_verify_round_trip() {
        let key = signing_key();
        let signed = XmlSigner::new(&key).sign(REQUEST, "_req1").unwrap();
        assert!(verify_with(&signed, CERT_PEM));
    }

    #[test]
    fn verification_fails_with_wrong_trust_key() {
        let key = signing_key();
        let signed = XmlSigner::new(&key).sign(REQUEST, "_req1").unwrap();
        assert!(!verify_with(&signed, OTHER_CERT_PEM));
    }

    #[test]
    fn tampered_signature_value_fails_verification() {
        let key = signing_key();
        let signed = XmlSigner::new(&key).sign(REQUEST, "_req1").unwrap();

        let start = signed.find("<ds:SignatureValue>").unwrap() + "<ds:SignatureValue>".len();
        let mut tampered = signed.clone();
        // flip the first base64 character of the signature value
        let original = tampered.as_bytes()[start];
        let replacement = if original == b'A' { 'B' } else { 'A' };
        tampered.replace_range(start..=start, &replacement.to_string());

        assert!(!verify_with(&tampered, CERT_PEM));
    }

    #[test]
    fn signature_without_issuer_goes_first() {
        let xml = r#"<m:EntityDescriptor xmlns:m="urn:oasis:names:tc:SAML:2.0:metadata" ID="_m1" entityID="https://idp.example.com"><m:IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol"></m:IDPSSODescriptor></m:EntityDescriptor>"#;
        let key = signing_key();
        let signed = XmlSigner::new(&key).sign(xml, "_m1").unwrap();

        let tag_end = signed.find('>').unwrap();
        assert_eq!(signed[tag_end + 1..].find("<ds:Signature"), Some(0));
        assert!(verify_with(&signed, CERT_PEM));
    }

    #[test]
    fn unknown_reference_id_fails() {
        let key = signing_key();
        let err = XmlSigner::new(&key).sign(REQUEST, "_missing").unwrap_err();
        assert!(matches!(err, SamlError::SignatureCreation(_)));
    }
}
