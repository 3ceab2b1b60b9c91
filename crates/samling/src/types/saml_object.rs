//! The tagged union over all mappable SAML document kinds.

use serde::{Deserialize, Serialize};

use crate::signature::{Signable, SignatureRecord};

use super::{
    Assertion, AuthnRequest, EntitiesCollection, LogoutRequest, LogoutResponse, Metadata, Response,
};

/// A SAML document mapped to (or from) its domain representation.
///
/// The mapping boundary matches exhaustively over this enum, so an
/// unimplemented kind is a visible gap rather than a runtime fallthrough
/// producing an empty object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SamlObject {
    /// Metadata for a single entity.
    Metadata(Metadata),
    /// An aggregate of entity metadata.
    EntitiesCollection(EntitiesCollection),
    /// An authentication request.
    AuthnRequest(AuthnRequest),
    /// A standalone assertion.
    Assertion(Assertion),
    /// A response message (recognized, not yet mapped).
    Response(Response),
    /// A logout request (recognized, not yet mapped).
    LogoutRequest(LogoutRequest),
    /// A logout response (recognized, not yet mapped).
    LogoutResponse(LogoutResponse),
}

impl SamlObject {
    /// The kind name used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Metadata(_) => "Metadata",
            Self::EntitiesCollection(_) => "EntitiesCollection",
            Self::AuthnRequest(_) => "AuthnRequest",
            Self::Assertion(_) => "Assertion",
            Self::Response(_) => "Response",
            Self::LogoutRequest(_) => "LogoutRequest",
            Self::LogoutResponse(_) => "LogoutResponse",
        }
    }

    /// The verified signature attached to the object, if any.
    #[must_use]
    pub fn signature(&self) -> Option<&SignatureRecord> {
        match self {
            Self::Metadata(m) => m.signature(),
            Self::EntitiesCollection(e) => e.signature(),
            Self::AuthnRequest(r) => r.signature(),
            Self::Assertion(a) => a.signature(),
            Self::Response(r) => r.signature(),
            Self::LogoutRequest(r) => r.signature(),
            Self::LogoutResponse(r) => r.signature(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        let object = SamlObject::Metadata(Metadata::new("https://idp.example.com"));
        assert_eq!(object.kind(), "Metadata");
        assert!(object.signature().is_none());
    }
}
