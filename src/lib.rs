//! bindforge - builds Go packages into importable Python extension modules
//!
//! Each package is compiled to a C shared library, wrapped in generated C
//! glue, linked into an extension module and assembled into a
//! distributable bundle.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

pub use builder::{BuildContext, BuildError, Pipeline};
pub use core::{
    manifest::Manifest, package::PackageSpec, platform::PlatformProfile, workspace::Workspace,
};
pub use util::context::GlobalContext;
