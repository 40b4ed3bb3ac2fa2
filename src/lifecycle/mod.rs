// ABOUTME: Image lifecycle orchestration: create, read, update, delete and import.
// ABOUTME: Sequences build spec parsing, credentials, build, push and registry inspection.

mod error;
mod orchestrator;

pub use error::{LifecycleError, LifecycleErrorKind};
pub use orchestrator::{Applied, DeleteOutcome, EnvLookup, ImageLifecycle, ReadOutcome};
