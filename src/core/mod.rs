//! Core data structures for bindforge.
//!
//! This module contains the foundational types used throughout bindforge:
//! - Package specifications and the manifest that declares them
//! - The platform profile resolved once per run
//! - Build artifacts, package states and outcomes
//! - Workspace paths

pub mod artifact;
pub mod manifest;
pub mod package;
pub mod platform;
pub mod workspace;

pub use artifact::{BuildArtifact, BuildOutcome, BuildStatus, PackageState, RunOutcome, Stage};
pub use manifest::{find_manifest, Manifest, ManifestError, MANIFEST_NAME};
pub use package::PackageSpec;
pub use platform::{Os, PlatformProfile};
pub use workspace::Workspace;
