// ABOUTME: Resource identifiers and validated image references.
// ABOUTME: Parsing rejects malformed references before any network call.

mod id;
mod image_ref;

pub use id::ResourceId;
pub use image_ref::{DEFAULT_REGISTRY, ImageRef, ParseImageRefError, Target};
