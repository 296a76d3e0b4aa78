// Shared utilities for suite runs.

/// Failure artifact collection for debugging and replay
pub mod artifacts;

pub use artifacts::{ArtifactCollector, FailureArtifact};
