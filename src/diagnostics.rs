// ABOUTME: Diagnostics accumulator for non-fatal warnings during lifecycle operations.
// ABOUTME: Collects problems that shouldn't fail an operation but should reach the engine.

use serde::Serialize;

/// Collects non-fatal warnings during lifecycle operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning and log it at warn level.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The image was pushed but its digest could not be read back.
    pub fn digest_refresh(message: impl Into<String>) -> Self {
        Self::new(WarningKind::DigestRefresh, message)
    }

    pub fn registry_delete(message: impl Into<String>) -> Self {
        Self::new(WarningKind::RegistryDelete, message)
    }

    /// The build requested something the toolchain ignores.
    pub fn unsupported_build_option(message: impl Into<String>) -> Self {
        Self::new(WarningKind::UnsupportedBuildOption, message)
    }
}

/// What a warning is about; serialized as a snake_case tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Digest lookup after push failed; `sha256_digest` left unset.
    DigestRefresh,
    /// Registry delete failed or credentials for it could not be resolved.
    RegistryDelete,
    /// Build option accepted but not acted on (additional contexts, extra platforms).
    UnsupportedBuildOption,
}
