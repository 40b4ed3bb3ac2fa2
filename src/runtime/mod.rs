// ABOUTME: Container runtime access for building and pushing images.
// ABOUTME: Auto-detects Docker or Podman and exposes the ImageToolchain capability.

mod detection;
mod engine;
mod error;
mod toolchain;
mod types;

pub use detection::{DetectionError, detect_local, detect_runtime};
pub use engine::{BollardToolchain, DEFAULT_TIMEOUT};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use toolchain::{BuildRequest, ImageToolchain, ToolchainError, push_name};
pub use types::{RuntimeConfig, RuntimeInfo, RuntimeType};
