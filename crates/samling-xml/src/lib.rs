//! # samling-xml
//!
//! XML document service for the samling SAML library.
//!
//! Wraps [`roxmltree`] behind an owned [`XmlDocument`] so that callers can
//! hold a parsed SAML message without fighting the borrow of the backing
//! text, and adds the namespace-qualified lookup helpers that SAML
//! processing needs (descendant search, child search, ID resolution).

#![forbid(unsafe_code)]

mod document;

pub use document::{
    child_attribute, child_text, find_child_element, find_child_elements, find_elements,
    XmlDocument,
};

use thiserror::Error;

/// Errors raised while parsing XML.
#[derive(Debug, Error)]
pub enum XmlError {
    /// The input is not well-formed XML.
    #[error("XML parsing error: {0}")]
    Parse(String),

    /// The input is not valid UTF-8.
    #[error("XML parsing error: invalid UTF-8: {0}")]
    Utf8(String),
}
