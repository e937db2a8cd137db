//! High-level operations.
//!
//! This module contains the implementation of bindforge commands.

pub mod bindforge_build;
pub mod bindforge_clean;
pub mod bindforge_plan;

pub use bindforge_build::{build, select_packages, BuildOptions, BuildResult};
pub use bindforge_clean::{clean, CleanOptions, CleanResult};
pub use bindforge_plan::{format_plan, plan, BuildPlan, PlanOptions};
