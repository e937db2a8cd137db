//! Extension module build pipeline.
//!
//! This module implements the stages that turn a Go package into a
//! loadable extension module, and the pipeline that drives them.

pub mod bindings;
pub mod context;
pub mod errors;
pub mod events;
pub mod host;
pub mod link;
pub mod package;
pub mod patch;
pub mod pipeline;
pub mod shared_lib;
pub mod toolchain;

pub use bindings::BindingGenerator;
pub use context::{BuildContext, BuildEnv};
pub use errors::BuildError;
pub use events::BuildEvent;
pub use link::ExtensionLinker;
pub use package::{ArtifactPackager, BundleManifest};
pub use patch::{PatchOutcome, SymbolPatch};
pub use pipeline::{Pipeline, PipelineReport};
pub use shared_lib::SharedLibraryBuilder;
pub use toolchain::{
    CommandSpec, GccToolchain, GoToolchain, MsvcToolchain, Toolchain, ToolchainPlatform,
};
