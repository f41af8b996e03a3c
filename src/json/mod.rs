//! JSON adapters: an index-table pull parser for reading headers and claims
//! in place, and a canonical writer for reproducible header bytes.

mod reader;
mod writer;

pub use reader::{JsonIndex, JsonKind, JsonNode, NO_NODE};
pub use writer::{canonical_object, serialize_claims};
