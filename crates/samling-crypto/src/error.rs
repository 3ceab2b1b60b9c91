//! Error type for cryptographic operations.

use thiserror::Error;

/// Errors raised by digest, signature, and certificate operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The supplied key material could not be used.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A signing operation failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A certificate could not be decoded into a public key.
    #[error("certificate decode failed: {0}")]
    CertificateDecode(String),

    /// The requested algorithm is not supported by this crate.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
}
