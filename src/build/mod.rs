// ABOUTME: Build input preparation: specification parsing and context packing.
// ABOUTME: Turns a JSON build spec into a BuildConfig and a context directory into a tar.

mod args;
mod context;
mod error;
pub mod interpolate;
mod spec;

pub use args::resolve_build_args;
pub use context::ContextArchive;
pub use error::{BuildSpecError, ContextError};
pub use interpolate::{InterpolationError, Lookup};
pub use spec::{BuildConfig, BuildSpec, DEFAULT_DOCKERFILE};
