//! PEM handling and X.509 certificate decoding.

use base64::Engine;

use crate::error::CryptoError;

/// Extracts the DER payload from a PEM block with the given label.
///
/// Returns `None` if the armor lines are missing or the payload is not
/// valid base64.
#[must_use]
pub fn pem_to_der(pem: &str, label: &str) -> Option<Vec<u8>> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let start = pem.find(&begin)? + begin.len();
    let end_pos = pem.find(&end)?;

    let b64: String = pem[start..end_pos]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    base64::engine::general_purpose::STANDARD.decode(&b64).ok()
}

/// Decodes a PEM certificate and extracts its subject public key.
///
/// The returned bytes are the raw DER `SubjectPublicKeyInfo`, suitable for
/// [`crate::rsa::rsa_verify`].
///
/// # Errors
///
/// Returns [`CryptoError::CertificateDecode`] when the PEM armor, base64
/// payload, or X.509 structure is invalid.
pub fn public_key_from_pem_certificate(pem: &str) -> Result<Vec<u8>, CryptoError> {
    let der = pem_to_der(pem, "CERTIFICATE")
        .ok_or_else(|| CryptoError::CertificateDecode("not a PEM certificate".to_string()))?;
    public_key_from_der_certificate(&der)
}

/// Extracts the subject public key from a DER certificate.
///
/// # Errors
///
/// Returns [`CryptoError::CertificateDecode`] when the X.509 structure is
/// invalid.
pub fn public_key_from_der_certificate(der: &[u8]) -> Result<Vec<u8>, CryptoError> {
    use x509_parser::prelude::*;

    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| CryptoError::CertificateDecode(format!("X.509 parse: {e}")))?;

    Ok(cert.public_key().raw.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CERT_PEM: &str = include_str!("../testdata/cert1.pem");

    #[test]
    fn pem_extraction() {
        let der = pem_to_der(CERT_PEM, "CERTIFICATE").unwrap();
        assert!(!der.is_empty());
        // DER SEQUENCE tag
        assert_eq!(der[0], 0x30);
    }

    #[test]
    fn pem_wrong_label() {
        assert!(pem_to_der(CERT_PEM, "PRIVATE KEY").is_none());
    }

    #[test]
    fn public_key_extraction() {
        let spki = public_key_from_pem_certificate(CERT_PEM).unwrap();
        // SubjectPublicKeyInfo is itself a DER SEQUENCE
        assert_eq!(spki[0], 0x30);
    }

    #[test]
    fn rejects_garbage() {
        let err = public_key_from_pem_certificate("not pem at all").unwrap_err();
        assert!(matches!(err, CryptoError::CertificateDecode(_)));

        let err = public_key_from_der_certificate(&[0xde, 0xad, 0xbe, 0xef]).unwrap_err();
        assert!(matches!(err, CryptoError::CertificateDecode(_)));
    }
}
