//! Trust keys, candidate iteration, and key location.
//!
//! SAML signatures usually carry no usable key identifier, so picking the
//! right trust key is a trial problem. The rules implemented here:
//!
//! - exactly one configured key: that key is trusted unconditionally, any
//!   identifier in the signature is ignored (single-IdP deployments never
//!   populate identifiers);
//! - more than one configured key: identifier-based resolution is
//!   unavailable for this document format, and the verifier must trial
//!   every candidate in order until one validates.
//!
//! The single-key rule is a deliberate policy: it lets the common
//! deployment skip identifier plumbing, at the cost that one misconfigured
//! key silently becomes "the" trusted key with no cross-check.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SamlResult;

/// A trusted public key, held as the PEM certificate it derives from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustKey {
    /// Optional configured name for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// PEM-encoded X.509 certificate.
    pub certificate: String,
}

impl TrustKey {
    /// Creates a trust key from a PEM certificate.
    #[must_use]
    pub fn new(certificate: impl Into<String>) -> Self {
        Self {
            name: None,
            certificate: certificate.into(),
        }
    }

    /// Sets the diagnostic name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A trust key decoded to the public key the verifier consumes.
#[derive(Debug, Clone)]
pub struct CandidateKey {
    /// DER-encoded `SubjectPublicKeyInfo` extracted from the certificate.
    pub spki_der: Vec<u8>,
}

/// Decodes every trust key's certificate up front.
///
/// A single undecodable certificate aborts the whole resolution with
/// [`crate::SamlError::CertificateDecode`]: a broken trust configuration
/// must surface immediately rather than silently shrinking the key set.
pub fn decode_candidates(keys: &[TrustKey]) -> SamlResult<Vec<CandidateKey>> {
    keys.iter()
        .map(|key| {
            let spki_der = samling_crypto::public_key_from_pem_certificate(&key.certificate)?;
            Ok(CandidateKey { spki_der })
        })
        .collect()
}

/// Error returned when the candidate key list has been fully consumed.
#[derive(Debug, Error)]
#[error("candidate trust keys exhausted after {tried} keys")]
pub struct KeysExhausted {
    /// How many keys were handed out before exhaustion.
    pub tried: usize,
}

/// Deterministic, resettable iteration over an ordered candidate key list.
///
/// Tracks the index of the key last handed out so the caller can tell
/// which candidate a successful verification used. Reset and reiterated
/// once per signature element within a resolution call; never shared
/// across threads.
#[derive(Debug)]
pub struct KeyCandidateIterator<'a> {
    keys: &'a [CandidateKey],
    position: usize,
    current: Option<usize>,
}

impl<'a> KeyCandidateIterator<'a> {
    /// Creates an iterator positioned before the first key.
    #[must_use]
    pub fn new(keys: &'a [CandidateKey]) -> Self {
        Self {
            keys,
            position: 0,
            current: None,
        }
    }

    /// Rewinds to the first key and clears the current index.
    pub fn reset(&mut self) {
        self.position = 0;
        self.current = None;
    }

    /// Hands out the next candidate key and advances.
    pub fn next_key(&mut self) -> Result<&'a CandidateKey, KeysExhausted> {
        if self.position >= self.keys.len() {
            return Err(KeysExhausted {
                tried: self.keys.len(),
            });
        }
        let key = &self.keys[self.position];
        self.current = Some(self.position);
        self.position += 1;
        Ok(key)
    }

    /// Index of the key last returned by [`Self::next_key`], or `None`
    /// before any call (and after a reset).
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Total number of candidate keys.
    #[must_use]
    pub fn total(&self) -> usize {
        self.keys.len()
    }
}

/// Key resolution capability handed to the signature verifier.
///
/// Owns the candidate iterator; the verifier first asks for resolution by
/// identifier and falls back to exhaustive trial via [`Self::candidates`].
#[derive(Debug)]
pub struct KeyLocator<'a> {
    iter: KeyCandidateIterator<'a>,
}

impl<'a> KeyLocator<'a> {
    /// Creates a locator over the decoded candidate keys.
    #[must_use]
    pub fn new(keys: &'a [CandidateKey]) -> Self {
        Self {
            iter: KeyCandidateIterator::new(keys),
        }
    }

    /// Resolves a key by identifier.
    ///
    /// With exactly one candidate configured, that key is returned no
    /// matter what (or whether) an identifier was supplied. With several
    /// candidates this returns `None`: SAML signatures do not carry
    /// identifiers this library can match, so the verifier must fall back
    /// to [`Self::candidates`].
    pub fn resolve(&mut self, _key_identifier: Option<&str>) -> Option<&'a CandidateKey> {
        if self.iter.total() == 1 {
            self.iter.reset();
            self.iter.next_key().ok()
        } else {
            None
        }
    }

    /// Resets and returns the candidate iterator for exhaustive trial.
    pub fn candidates(&mut self) -> &mut KeyCandidateIterator<'a> {
        self.iter.reset();
        &mut self.iter
    }

    /// Index of the candidate that the last [`KeyCandidateIterator::next_key`]
    /// call handed out.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.iter.current_index()
    }

    /// Total number of candidate keys.
    #[must_use]
    pub fn total(&self) -> usize {
        self.iter.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SamlError;

    const CERT_1: &str = include_str!("../../testdata/cert1.pem");
    const CERT_2: &str = include_str!("../../testdata/cert2.pem");

    fn candidates(n: usize) -> Vec<CandidateKey> {
        (0..n)
            .map(|i| CandidateKey {
                spki_der: vec![i as u8],
            })
            .collect()
    }

    #[test]
    fn iterator_walks_in_order() {
        let keys = candidates(3);
        let mut iter = KeyCandidateIterator::new(&keys);
        assert_eq!(iter.current_index(), None);

        assert_eq!(iter.next_key().unwrap().spki_der, vec![0]);
        assert_eq!(iter.current_index(), Some(0));
        assert_eq!(iter.next_key().unwrap().spki_der, vec![1]);
        assert_eq!(iter.next_key().unwrap().spki_der, vec![2]);
        assert_eq!(iter.current_index(), Some(2));

        let err = iter.next_key().unwrap_err();
        assert_eq!(err.tried, 3);
        // exhaustion keeps the last successful index
        assert_eq!(iter.current_index(), Some(2));
    }

    #[test]
    fn iterator_reset_allows_reiteration() {
        let keys = candidates(2);
        let mut iter = KeyCandidateIterator::new(&keys);
        let _ = iter.next_key().unwrap();
        let _ = iter.next_key().unwrap();

        iter.reset();
        assert_eq!(iter.current_index(), None);
        assert_eq!(iter.next_key().unwrap().spki_der, vec![0]);
    }

    #[test]
    fn empty_list_is_immediately_exhausted() {
        let keys = candidates(0);
        let mut iter = KeyCandidateIterator::new(&keys);
        assert_eq!(iter.next_key().unwrap_err().tried, 0);
    }

    #[test]
    fn locator_single_key_ignores_identifier() {
        let keys = candidates(1);
        let mut locator = KeyLocator::new(&keys);

        assert!(locator.resolve(Some("ignored-kid")).is_some());
        assert_eq!(locator.current_index(), Some(0));
        assert!(locator.resolve(None).is_some());
    }

    #[test]
    fn locator_multiple_keys_unresolvable_by_identifier() {
        let keys = candidates(2);
        let mut locator = KeyLocator::new(&keys);

        assert!(locator.resolve(Some("kid")).is_none());
        assert!(locator.resolve(None).is_none());

        // fallback: exhaustive trial
        let iter = locator.candidates();
        assert_eq!(iter.next_key().unwrap().spki_der, vec![0]);
        assert_eq!(iter.next_key().unwrap().spki_der, vec![1]);
    }

    #[test]
    fn decode_candidates_from_certificates() {
        let keys = vec![
            TrustKey::new(CERT_1).with_name("one"),
            TrustKey::new(CERT_2),
        ];
        let decoded = decode_candidates(&keys).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_ne!(decoded[0].spki_der, decoded[1].spki_der);
    }

    #[test]
    fn decode_candidates_fails_closed_on_bad_certificate() {
        let keys = vec![TrustKey::new(CERT_1), TrustKey::new("garbage")];
        let err = decode_candidates(&keys).unwrap_err();
        assert!(matches!(err, SamlError::CertificateDecode(_)));
    }
}
