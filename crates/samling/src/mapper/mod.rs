//! Mapping between the XML wire format and domain objects.
//!
//! [`read_document`] turns a parsed tree plus the document's validated
//! signature map into a [`crate::types::SamlObject`]; [`write_document`]
//! is the inverse, producing signed output for objects that carry a
//! signing key. Round-tripping an object through both directions
//! reproduces equal domain data (signature state aside, since
//! re-serialization re-signs rather than preserving bytes).

mod read;
mod write;

pub use read::read_document;
pub use write::write_document;
