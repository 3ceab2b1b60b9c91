//! RSA PKCS#1 v1.5 signatures for the XML-DSig algorithm suite.
//!
//! SAML 2.0 deployments overwhelmingly sign with RSA; the SHA-256 variant
//! remains the interoperability baseline even though newer suites exist.

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{self, RsaKeyPair},
};

use crate::error::CryptoError;

/// RSA signature algorithms used by XML-DSig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaAlgorithm {
    /// RSA PKCS#1 v1.5 with SHA-256.
    Sha256,
    /// RSA PKCS#1 v1.5 with SHA-384.
    Sha384,
    /// RSA PKCS#1 v1.5 with SHA-512.
    Sha512,
}

impl RsaAlgorithm {
    /// Returns the XML-DSig signature algorithm URI.
    #[must_use]
    pub const fn signature_uri(self) -> &'static str {
        match self {
            Self::Sha256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            Self::Sha384 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384",
            Self::Sha512 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512",
        }
    }

    /// Parses an algorithm from its XML-DSig signature URI.
    #[must_use]
    pub fn from_signature_uri(uri: &str) -> Option<Self> {
        match uri {
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256" => Some(Self::Sha256),
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384" => Some(Self::Sha384),
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

/// Signs data with an RSA private key.
///
/// The key may be PKCS#1 or PKCS#8 DER.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKey`] if the key cannot be parsed and
/// [`CryptoError::Signing`] if the signature operation fails.
pub fn rsa_sign(
    private_key_der: &[u8],
    data: &[u8],
    algorithm: RsaAlgorithm,
) -> Result<Vec<u8>, CryptoError> {
    let key_pair = RsaKeyPair::from_der(private_key_der)
        .or_else(|_| RsaKeyPair::from_pkcs8(private_key_der))
        .map_err(|e| CryptoError::InvalidKey(format!("RSA private key: {e}")))?;

    let padding = match algorithm {
        RsaAlgorithm::Sha256 => &signature::RSA_PKCS1_SHA256,
        RsaAlgorithm::Sha384 => &signature::RSA_PKCS1_SHA384,
        RsaAlgorithm::Sha512 => &signature::RSA_PKCS1_SHA512,
    };

    let rng = SystemRandom::new();
    let mut sig = vec![0u8; key_pair.public_modulus_len()];
    key_pair
        .sign(padding, &rng, data, &mut sig)
        .map_err(|e| CryptoError::Signing(format!("RSA signing failed: {e}")))?;

    Ok(sig)
}

/// Verifies an RSA signature against a public key.
///
/// `public_key_der` is a DER-encoded `SubjectPublicKeyInfo`, typically
/// produced by [`crate::cert::public_key_from_pem_certificate`].
///
/// A well-formed but non-matching signature yields `Ok(false)`, not an
/// error; errors are reserved for malformed inputs.
pub fn rsa_verify(
    public_key_der: &[u8],
    data: &[u8],
    sig: &[u8],
    algorithm: RsaAlgorithm,
) -> Result<bool, CryptoError> {
    use aws_lc_rs::signature::{
        UnparsedPublicKey, RSA_PKCS1_2048_8192_SHA256, RSA_PKCS1_2048_8192_SHA384,
        RSA_PKCS1_2048_8192_SHA512,
    };

    let verification_alg: &dyn signature::VerificationAlgorithm = match algorithm {
        RsaAlgorithm::Sha256 => &RSA_PKCS1_2048_8192_SHA256,
        RsaAlgorithm::Sha384 => &RSA_PKCS1_2048_8192_SHA384,
        RsaAlgorithm::Sha512 => &RSA_PKCS1_2048_8192_SHA512,
    };

    let public_key = UnparsedPublicKey::new(verification_alg, public_key_der);
    Ok(public_key.verify(data, sig).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::{pem_to_der, public_key_from_pem_certificate};

    const KEY_PEM: &str = include_str!("../testdata/key1.pem");
    const CERT_PEM: &str = include_str!("../testdata/cert1.pem");
    const OTHER_CERT_PEM: &str = include_str!("../testdata/cert2.pem");

    #[test]
    fn sign_verify_round_trip() {
        let key_der = pem_to_der(KEY_PEM, "PRIVATE KEY").unwrap();
        let spki = public_key_from_pem_certificate(CERT_PEM).unwrap();

        let data = b"canonical signed info bytes";
        let sig = rsa_sign(&key_der, data, RsaAlgorithm::Sha256).unwrap();
        assert!(rsa_verify(&spki, data, &sig, RsaAlgorithm::Sha256).unwrap());
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let key_der = pem_to_der(KEY_PEM, "PRIVATE KEY").unwrap();
        let other_spki = public_key_from_pem_certificate(OTHER_CERT_PEM).unwrap();

        let sig = rsa_sign(&key_der, b"data", RsaAlgorithm::Sha256).unwrap();
        assert!(!rsa_verify(&other_spki, b"data", &sig, RsaAlgorithm::Sha256).unwrap());
    }

    #[test]
    fn verify_rejects_tampered_data() {
        let key_der = pem_to_der(KEY_PEM, "PRIVATE KEY").unwrap();
        let spki = public_key_from_pem_certificate(CERT_PEM).unwrap();

        let sig = rsa_sign(&key_der, b"data", RsaAlgorithm::Sha256).unwrap();
        assert!(!rsa_verify(&spki, b"DATA", &sig, RsaAlgorithm::Sha256).unwrap());
    }

    #[test]
    fn algorithm_uri_round_trip() {
        for alg in [RsaAlgorithm::Sha256, RsaAlgorithm::Sha384, RsaAlgorithm::Sha512] {
            assert_eq!(RsaAlgorithm::from_signature_uri(alg.signature_uri()), Some(alg));
        }
        assert_eq!(RsaAlgorithm::from_signature_uri("urn:nope"), None);
    }
}
