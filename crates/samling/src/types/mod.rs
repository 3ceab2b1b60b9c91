//! SAML 2.0 domain types.
//!
//! The data structures SAML documents map to and from: metadata, requests,
//! assertions, logout messages, and the constants the wire format uses.

mod assertion;
mod authn_request;
mod constants;
mod logout;
mod metadata;
mod name_id;
mod response;
mod saml_object;
mod status;

pub use assertion::*;
pub use authn_request::*;
pub use constants::*;
pub use logout::*;
pub use metadata::*;
pub use name_id::*;
pub use response::*;
pub use saml_object::*;
pub use status::*;
