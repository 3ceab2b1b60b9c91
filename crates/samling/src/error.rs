//! SAML error types.
//!
//! Every error aborts the processing of the whole document: the library
//! performs no internal retries and returns no partial results. Messages
//! carry the offending element name or the number of candidate keys tried,
//! since trust-configuration mistakes (rotated or mismatched certificates)
//! are the dominant failure mode in SAML deployments.

use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML processing errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// XML parsing error; the input is not a well-formed document.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// A `<Signature>` element lacks a mandatory field.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// No candidate key validated a signature, or the document carried
    /// colliding signatures. Fail-closed for the whole document.
    #[error("signature validation failed: {0}")]
    SignatureValidation(String),

    /// XML signature creation failed.
    #[error("signature creation failed: {0}")]
    SignatureCreation(String),

    /// A configured trust key's certificate could not be decoded.
    #[error("certificate decode failed: {0}")]
    CertificateDecode(String),

    /// A recognized message kind that the mapper does not implement.
    #[error("unsupported object kind: {0}")]
    UnsupportedObjectKind(String),

    /// Missing required element.
    #[error("missing required element: {0}")]
    MissingElement(String),

    /// Missing required attribute.
    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// Cryptographic operation error.
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl From<samling_xml::XmlError> for SamlError {
    fn from(err: samling_xml::XmlError) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<samling_crypto::CryptoError> for SamlError {
    fn from(err: samling_crypto::CryptoError) -> Self {
        match err {
            samling_crypto::CryptoError::CertificateDecode(msg) => Self::CertificateDecode(msg),
            other => Self::Crypto(other.to_string()),
        }
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certificate_errors_keep_their_kind() {
        let err: SamlError =
            samling_crypto::CryptoError::CertificateDecode("bad PEM".to_string()).into();
        assert!(matches!(err, SamlError::CertificateDecode(_)));

        let err: SamlError = samling_crypto::CryptoError::Signing("rsa".to_string()).into();
        assert!(matches!(err, SamlError::Crypto(_)));
    }
}
