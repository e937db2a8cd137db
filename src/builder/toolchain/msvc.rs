//! MSVC toolchain implementation.

use std::path::{Path, PathBuf};

use super::{CommandSpec, ExtensionLinkInput, Toolchain, ToolchainPlatform};

/// MSVC toolchain (Windows).
#[derive(Debug, Clone)]
pub struct MsvcToolchain {
    /// Path to cl.exe (compiler and link driver)
    pub cl: PathBuf,
}

impl MsvcToolchain {
    /// Create a new MSVC toolchain.
    pub fn new(cl: PathBuf) -> Self {
        MsvcToolchain { cl }
    }
}

impl Toolchain for MsvcToolchain {
    fn platform(&self) -> ToolchainPlatform {
        ToolchainPlatform::Msvc
    }

    fn compiler_path(&self) -> &Path {
        &self.cl
    }

    fn link_extension_command(&self, input: &ExtensionLinkInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cl);

        // Quiet logo, build a DLL
        cmd = cmd.arg("/nologo");
        cmd = cmd.arg("/LD");

        // Include directories
        cmd = cmd.arg(format!("/I{}", input.package_dir.display()));
        for dir in &input.include_dirs {
            cmd = cmd.arg(format!("/I{}", dir.display()));
        }

        // Custom flags
        cmd = cmd.args(input.cflags.iter().cloned());

        // Keep the object file inside the package directory
        cmd = cmd.arg(format!("/Fo{}\\", input.package_dir.display()));

        // Input
        cmd = cmd.arg(input.glue_source.display().to_string());

        // Everything after /link goes to link.exe
        cmd = cmd.arg("/link");
        cmd = cmd.arg(format!("/LIBPATH:{}", input.package_dir.display()));
        for dir in &input.lib_dirs {
            cmd = cmd.arg(format!("/LIBPATH:{}", dir.display()));
        }

        // Import library of the Go DLL, then host libraries
        cmd = cmd.arg(format!("{}.lib", input.library_stem));
        for lib in &input.libs {
            cmd = cmd.arg(format!("{}.lib", lib));
        }

        cmd = cmd.args(input.ldflags.iter().cloned());

        // Output
        cmd = cmd.arg(format!("/OUT:{}", input.output.display()));

        cmd
    }
}
