//! The signature verification primitive.
//!
//! [`SignatureVerifier`] is the seam between trust resolution and the
//! XML-DSig mechanics. The resolver hands an implementation one
//! `<ds:Signature>` node at a time together with a [`KeyLocator`];
//! implementations must first try identifier-based resolution and then
//! call [`KeyCandidateIterator::next_key`] repeatedly until a key
//! validates or the candidate set is exhausted, so that the locator's
//! current index reports which key succeeded.

use base64::Engine;

use samling_xml::{child_attribute, child_text, find_child_element, XmlDocument};

use crate::error::{SamlError, SamlResult};
use crate::types::XMLDSIG_NS;

use super::keys::{KeyCandidateIterator, KeyLocator};
use super::{build_signed_info, canonicalize, DigestAlgorithm, SignatureAlgorithm};

/// Verifies one signature element against candidate trust keys.
pub trait SignatureVerifier {
    /// Returns `Ok(true)` if some candidate key validates the signature,
    /// `Ok(false)` if every candidate was tried and none validated, and an
    /// error for structurally broken signatures.
    fn verify(
        &self,
        doc: &XmlDocument,
        tree: &roxmltree::Document<'_>,
        signature: roxmltree::Node<'_, '_>,
        locator: &mut KeyLocator<'_>,
    ) -> SamlResult<bool>;
}

/// XML-DSig verifier for enveloped SAML signatures.
///
/// Checks the reference digest over the signed element (with the signature
/// itself spliced out), then verifies the RSA signature over the
/// canonicalized `<ds:SignedInfo>`. Canonicalization is the same
/// whitespace-normalizing subset the signer uses, so output of this
/// library and of producers emitting pre-canonicalized documents verify;
/// SHA-1 suites are rejected outright.
#[derive(Debug, Default)]
pub struct DsigVerifier;

impl DsigVerifier {
    /// Creates a verifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Raw fields read from `<ds:SignedInfo>` for verification purposes.
struct SignedInfoFields {
    canonicalization_uri: String,
    signature_uri: String,
    reference_uri: String,
    digest_uri: String,
    digest_value: String,
}

impl SignatureVerifier for DsigVerifier {
    fn verify(
        &self,
        doc: &XmlDocument,
        tree: &roxmltree::Document<'_>,
        signature: roxmltree::Node<'_, '_>,
        locator: &mut KeyLocator<'_>,
    ) -> SamlResult<bool> {
        let fields = read_signed_info(signature)?;

        let algorithm = SignatureAlgorithm::from_uri(&fields.signature_uri).ok_or_else(|| {
            SamlError::SignatureValidation(format!(
                "unknown signature algorithm: {}",
                fields.signature_uri
            ))
        })?;
        if algorithm.is_deprecated() {
            return Err(SamlError::SignatureValidation(
                "SHA-1 signatures are not supported".to_string(),
            ));
        }
        let digest_algorithm = DigestAlgorithm::from_uri(&fields.digest_uri).ok_or_else(|| {
            SamlError::SignatureValidation(format!(
                "unknown digest algorithm: {}",
                fields.digest_uri
            ))
        })?;

        verify_reference_digest(doc, tree, signature, &fields, digest_algorithm)?;

        // Canonical SignedInfo is rebuilt from the extracted fields with the
        // same template the signer uses.
        let signed_info = build_signed_info(
            &fields.reference_uri,
            &fields.digest_value,
            &fields.signature_uri,
            &fields.canonicalization_uri,
            &fields.digest_uri,
        );
        let canonical_signed_info = canonicalize(&signed_info);

        let signature_value = child_text(signature, XMLDSIG_NS, "SignatureValue")
            .map(strip_whitespace)
            .ok_or_else(|| SamlError::MalformedSignature("SignatureValue missing".to_string()))?;
        let signature_bytes = base64::engine::general_purpose::STANDARD
            .decode(&signature_value)
            .map_err(|e| {
                SamlError::MalformedSignature(format!("SignatureValue is not valid base64: {e}"))
            })?;

        let rsa_algorithm = rsa_algorithm(algorithm)?;
        let key_name = child_text(signature, XMLDSIG_NS, "KeyName");

        // Identifier-based fast path: a lone configured key is trusted
        // unconditionally, so no iteration happens.
        if let Some(key) = locator.resolve(key_name.as_deref()) {
            let ok = samling_crypto::rsa_verify(
                &key.spki_der,
                canonical_signed_info.as_bytes(),
                &signature_bytes,
                rsa_algorithm,
            )?;
            return Ok(ok);
        }

        trial_candidates(
            locator.candidates(),
            canonical_signed_info.as_bytes(),
            &signature_bytes,
            rsa_algorithm,
        )
    }
}

/// Tries every candidate key in order until one validates.
fn trial_candidates(
    iter: &mut KeyCandidateIterator<'_>,
    data: &[u8],
    signature: &[u8],
    algorithm: samling_crypto::RsaAlgorithm,
) -> SamlResult<bool> {
    loop {
        match iter.next_key() {
            Ok(key) => {
                if samling_crypto::rsa_verify(&key.spki_der, data, signature, algorithm)? {
                    return Ok(true);
                }
            }
            Err(_) => return Ok(false),
        }
    }
}

fn read_signed_info(signature: roxmltree::Node<'_, '_>) -> SamlResult<SignedInfoFields> {
    let signed_info = find_child_element(signature, XMLDSIG_NS, "SignedInfo")
        .ok_or_else(|| SamlError::MalformedSignature("SignedInfo missing".to_string()))?;

    let canonicalization_uri =
        child_attribute(signed_info, XMLDSIG_NS, "CanonicalizationMethod", "Algorithm")
            .ok_or_else(|| {
                SamlError::MalformedSignature("CanonicalizationMethod missing".to_string())
            })?;
    let signature_uri = child_attribute(signed_info, XMLDSIG_NS, "SignatureMethod", "Algorithm")
        .ok_or_else(|| SamlError::MalformedSignature("SignatureMethod missing".to_string()))?;
    let reference_uri = child_attribute(signed_info, XMLDSIG_NS, "Reference", "URI")
        .ok_or_else(|| SamlError::MalformedSignature("Reference URI missing".to_string()))?;
    let digest_uri = child_attribute(signed_info, XMLDSIG_NS, "DigestMethod", "Algorithm")
        .ok_or_else(|| SamlError::MalformedSignature("DigestMethod missing".to_string()))?;
    let digest_value = child_text(signed_info, XMLDSIG_NS, "DigestValue")
        .map(strip_whitespace)
        .ok_or_else(|| SamlError::MalformedSignature("DigestValue missing".to_string()))?;

    Ok(SignedInfoFields {
        canonicalization_uri,
        signature_uri,
        reference_uri,
        digest_uri,
        digest_value,
    })
}

/// Recomputes the reference digest and compares it to the declared value.
fn verify_reference_digest(
    doc: &XmlDocument,
    tree: &roxmltree::Document<'_>,
    signature: roxmltree::Node<'_, '_>,
    fields: &SignedInfoFields,
    digest_algorithm: DigestAlgorithm,
) -> SamlResult<()> {
    let reference_id = fields.reference_uri.strip_prefix('#').ok_or_else(|| {
        SamlError::SignatureValidation(format!(
            "unsupported reference URI: {}",
            fields.reference_uri
        ))
    })?;

    let id_map = XmlDocument::build_id_map(tree, &["ID", "Id", "id"]);
    let referenced = XmlDocument::find_by_id(tree, &id_map, reference_id).ok_or_else(|| {
        SamlError::SignatureValidation(format!("referenced element '{reference_id}' not found"))
    })?;

    // Enveloped-signature transform: splice this signature's bytes out of
    // the referenced element. Byte ranges keep sibling signatures intact
    // when the reference covers a whole aggregate.
    let elem_range = referenced.range();
    let sig_range = signature.range();
    let element_xml = &doc.text()[elem_range.start..elem_range.end];
    let without_signature =
        if sig_range.start >= elem_range.start && sig_range.end <= elem_range.end {
            let rel_start = sig_range.start - elem_range.start;
            let rel_end = sig_range.end - elem_range.start;
            format!("{}{}", &element_xml[..rel_start], &element_xml[rel_end..])
        } else {
            element_xml.to_string()
        };

    let canonical = canonicalize(&without_signature);
    let computed = match digest_algorithm {
        DigestAlgorithm::Sha256 => samling_crypto::sha256(canonical.as_bytes()),
        DigestAlgorithm::Sha384 => samling_crypto::sha384(canonical.as_bytes()),
        DigestAlgorithm::Sha512 => samling_crypto::sha512(canonical.as_bytes()),
        DigestAlgorithm::Sha1 => {
            return Err(SamlError::SignatureValidation(
                "SHA-1 digests are not supported".to_string(),
            ));
        }
    };
    let computed_b64 = base64::engine::general_purpose::STANDARD.encode(&computed);

    if computed_b64 != fields.digest_value {
        return Err(SamlError::SignatureValidation(
            "digest value mismatch for referenced element".to_string(),
        ));
    }
    Ok(())
}

fn rsa_algorithm(algorithm: SignatureAlgorithm) -> SamlResult<samling_crypto::RsaAlgorithm> {
    match algorithm {
        SignatureAlgorithm::RsaSha256 => Ok(samling_crypto::RsaAlgorithm::Sha256),
        SignatureAlgorithm::RsaSha384 => Ok(samling_crypto::RsaAlgorithm::Sha384),
        SignatureAlgorithm::RsaSha512 => Ok(samling_crypto::RsaAlgorithm::Sha512),
        SignatureAlgorithm::RsaSha1 => Err(SamlError::SignatureValidation(
            "SHA-1 signatures are not supported".to_string(),
        )),
    }
}

fn strip_whitespace(s: String) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::keys::CandidateKey;

    fn verify_str(xml: &str) -> SamlResult<bool> {
        let doc = XmlDocument::parse(xml.to_string()).unwrap();
        let tree = doc.tree().unwrap();
        let signature = samling_xml::find_elements(&tree, XMLDSIG_NS, "Signature")[0];
        let keys = vec![CandidateKey { spki_der: vec![0] }, CandidateKey { spki_der: vec![1] }];
        let mut locator = KeyLocator::new(&keys);
        DsigVerifier::new().verify(&doc, &tree, signature, &mut locator)
    }

    #[test]
    fn missing_signed_info_is_malformed() {
        let xml = r#"<Root xmlns:ds="http://www.w3.org/2000/09/xmldsig#" ID="_r"><ds:Signature/></Root>"#;
        let err = verify_str(xml).unwrap_err();
        assert!(matches!(err, SamlError::MalformedSignature(_)));
    }

    #[test]
    fn unknown_signature_algorithm_fails_validation() {
        let xml = r##"<Root xmlns:ds="http://www.w3.org/2000/09/xmldsig#" ID="_r"><ds:Signature><ds:SignedInfo>
<ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>
<ds:SignatureMethod Algorithm="urn:example:custom"/>
<ds:Reference URI="#_r"><ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/><ds:DigestValue>AAAA</ds:DigestValue></ds:Reference>
</ds:SignedInfo></ds:Signature></Root>"##;
        let err = verify_str(xml).unwrap_err();
        assert!(matches!(err, SamlError::SignatureValidation(_)));
    }

    #[test]
    fn sha1_suite_is_rejected() {
        let xml = r##"<Root xmlns:ds="http://www.w3.org/2000/09/xmldsig#" ID="_r"><ds:Signature><ds:SignedInfo>
<ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>
<ds:SignatureMethod Algorithm="http://www.w3.org/2000/09/xmldsig#rsa-sha1"/>
<ds:Reference URI="#_r"><ds:DigestMethod Algorithm="http://www.w3.org/2000/09/xmldsig#sha1"/><ds:DigestValue>AAAA</ds:DigestValue></ds:Reference>
</ds:SignedInfo></ds:Signature></Root>"##;
        let err = verify_str(xml).unwrap_err();
        assert!(matches!(err, SamlError::SignatureValidation(_)));
    }

    #[test]
    fn dangling_reference_fails_validation() {
        let xml = r##"<Root xmlns:ds="http://www.w3.org/2000/09/xmldsig#" ID="_r"><ds:Signature><ds:SignedInfo>
<ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>
<ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/>
<ds:Reference URI="#_other"><ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/><ds:DigestValue>AAAA</ds:DigestValue></ds:Reference>
</ds:SignedInfo></ds:Signature></Root>"##;
        let err = verify_str(xml).unwrap_err();
        match err {
            SamlError::SignatureValidation(msg) => assert!(msg.contains("_other")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
