//! # samling-crypto
//!
//! Cryptographic primitives for the samling SAML library, backed by
//! aws-lc-rs.
//!
//! SAML 2.0 interoperability pins this crate to the XML-DSig algorithm
//! suite: SHA-2 digests and RSA PKCS#1 v1.5 signatures. Key material
//! arrives as PEM certificates (trust anchors) or PEM private keys
//! (signing), and is decoded here into the DER forms the underlying
//! primitives consume.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;

pub mod cert;
pub mod hash;
pub mod rsa;

pub use cert::{pem_to_der, public_key_from_der_certificate, public_key_from_pem_certificate};
pub use error::CryptoError;
pub use hash::{sha256, sha384, sha512};
pub use rsa::{rsa_sign, rsa_verify, RsaAlgorithm};
