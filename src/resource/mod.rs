// ABOUTME: The managed image resource: its record and its declarative schema.
// ABOUTME: Records travel as JSON between the engine and the lifecycle verbs.

mod record;
pub mod schema;

pub use record::ImageResource;
pub use schema::{Schema, image_resource_schema};
