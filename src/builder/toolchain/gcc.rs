//! GCC/Clang toolchain implementation.

use std::path::{Path, PathBuf};

use super::{CommandSpec, ExtensionLinkInput, Toolchain, ToolchainPlatform};

/// GCC/Clang toolchain (Unix-like systems and MinGW).
#[derive(Debug, Clone)]
pub struct GccToolchain {
    /// Path to the C compiler driver
    pub cc: PathBuf,
    /// Compiler family (gcc, clang, apple-clang)
    pub family: ToolchainPlatform,
}

impl GccToolchain {
    /// Create a new GCC-style toolchain.
    pub fn new(cc: PathBuf, family: ToolchainPlatform) -> Self {
        GccToolchain { cc, family }
    }
}

impl Toolchain for GccToolchain {
    fn platform(&self) -> ToolchainPlatform {
        self.family
    }

    fn compiler_path(&self) -> &Path {
        &self.cc
    }

    fn link_extension_command(&self, input: &ExtensionLinkInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cc);

        // Position-independent shared object
        cmd = cmd.arg("-shared");
        cmd = cmd.arg("-fPIC");

        // The Go header lives next to the glue
        cmd = cmd.arg(format!("-I{}", input.package_dir.display()));
        for dir in &input.include_dirs {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }

        // Custom flags
        cmd = cmd.args(input.cflags.iter().cloned());

        // Input
        cmd = cmd.arg(input.glue_source.display().to_string());

        // Library search paths
        cmd = cmd.arg(format!("-L{}", input.package_dir.display()));
        for dir in &input.lib_dirs {
            cmd = cmd.arg(format!("-L{}", dir.display()));
        }

        // Libraries
        cmd = cmd.arg(format!("-l{}", input.library_stem));
        for lib in &input.libs {
            cmd = cmd.arg(format!("-l{}", lib));
        }

        cmd = cmd.args(input.host_symbol_flags.iter().cloned());
        if let Some(flag) = &input.runtime_search_path_flag {
            cmd = cmd.arg(flag.clone());
        }

        cmd = cmd.args(input.ldflags.iter().cloned());

        // Output
        cmd = cmd.arg("-o");
        cmd = cmd.arg(input.output.display().to_string());

        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::{Os, PlatformProfile};

    fn input(os: Os) -> ExtensionLinkInput {
        ExtensionLinkInput::new(
            PathBuf::from("banbta/ta/ta.c"),
            PathBuf::from("banbta/ta/_ta.cpython-312-x86_64-linux-gnu.so"),
            PathBuf::from("banbta/ta"),
            "ta_go",
            &PlatformProfile::for_os(os),
        )
    }

    #[test]
    fn test_linux_link_command() {
        let mut input = input(Os::Linux);
        input.include_dirs.push(PathBuf::from("/usr/include/python3.12"));

        let tc = GccToolchain::new(PathBuf::from("cc"), ToolchainPlatform::Gcc);
        let cmd = tc.link_extension_command(&input);

        assert_eq!(cmd.program, PathBuf::from("cc"));
        assert_eq!(
            cmd.args,
            vec![
                "-shared",
                "-fPIC",
                "-Ibanbta/ta",
                "-I/usr/include/python3.12",
                "banbta/ta/ta.c",
                "-Lbanbta/ta",
                "-lta_go",
                "-Wl,-rpath,$ORIGIN",
                "-o",
                "banbta/ta/_ta.cpython-312-x86_64-linux-gnu.so",
            ]
        );
    }

    #[test]
    fn test_macos_link_command_defers_host_symbols() {
        let tc = GccToolchain::new(PathBuf::from("cc"), ToolchainPlatform::AppleClang);
        let cmd = tc.link_extension_command(&input(Os::MacOs));

        let undefined = cmd.args.iter().position(|a| a == "-undefined").unwrap();
        assert_eq!(cmd.args[undefined + 1], "dynamic_lookup");
        assert!(cmd.args.contains(&"-Wl,-rpath,@loader_path".to_string()));
        assert!(!cmd.args.iter().any(|a| a.contains("$ORIGIN")));
    }
}
