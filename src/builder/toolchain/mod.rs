//! Toolchain abstraction for the external compilers bindforge drives.
//!
//! The Go toolchain builds each package in `c-shared` mode; a C compiler
//! driver (GCC, Clang or MSVC) then compiles and links the generated glue
//! into an extension module. Toolchains only produce [`CommandSpec`]s; they
//! never run anything themselves.
//!
//! The C driver is `toolchain.cc` from config when set, otherwise `cc`
//! (`cl` on Windows). Its family is inferred from the file name; a missing
//! compiler surfaces when the link command is first run.

use std::path::{Path, PathBuf};

use crate::core::platform::{Os, PlatformProfile};

mod gcc;
mod go;
mod msvc;

pub use gcc::GccToolchain;
pub use go::GoToolchain;
pub use msvc::MsvcToolchain;

/// A command to execute, with program and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to run (e.g., "go", "cc", "cl.exe")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }
}

/// Input for linking one extension module.
#[derive(Debug, Clone)]
pub struct ExtensionLinkInput {
    /// Generated glue source (possibly patched)
    pub glue_source: PathBuf,
    /// Extension module to produce
    pub output: PathBuf,
    /// Package directory: holds the Go header and shared library
    pub package_dir: PathBuf,
    /// Shared library stem (`ta_go`)
    pub library_stem: String,
    /// Host runtime header directories
    pub include_dirs: Vec<PathBuf>,
    /// Host runtime library directories
    pub lib_dirs: Vec<PathBuf>,
    /// Host runtime libraries (without prefix or extension)
    pub libs: Vec<String>,
    /// Additional compiler flags
    pub cflags: Vec<String>,
    /// Additional linker flags
    pub ldflags: Vec<String>,
    /// Runtime search path flag from the platform profile
    pub runtime_search_path_flag: Option<String>,
    /// Flags for host symbols resolved at load time
    pub host_symbol_flags: Vec<String>,
}

impl ExtensionLinkInput {
    /// Start a link input with the platform-dependent flags filled in.
    pub fn new(
        glue_source: PathBuf,
        output: PathBuf,
        package_dir: PathBuf,
        library_stem: impl Into<String>,
        profile: &PlatformProfile,
    ) -> Self {
        ExtensionLinkInput {
            glue_source,
            output,
            package_dir,
            library_stem: library_stem.into(),
            include_dirs: Vec::new(),
            lib_dirs: Vec::new(),
            libs: Vec::new(),
            cflags: Vec::new(),
            ldflags: Vec::new(),
            runtime_search_path_flag: profile.runtime_search_path_flag.map(str::to_string),
            host_symbol_flags: profile
                .host_symbol_flags()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// The family of a C compiler driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainPlatform {
    /// GCC (GNU Compiler Collection)
    Gcc,
    /// Clang/LLVM
    Clang,
    /// Apple Clang (macOS)
    AppleClang,
    /// Microsoft Visual C++
    Msvc,
}

impl ToolchainPlatform {
    /// Get the platform name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainPlatform::Gcc => "gcc",
            ToolchainPlatform::Clang => "clang",
            ToolchainPlatform::AppleClang => "apple-clang",
            ToolchainPlatform::Msvc => "msvc",
        }
    }

    /// Infer the family from a compiler path and the target OS.
    pub fn infer(compiler: &Path, os: Os) -> Self {
        let stem = compiler
            .file_stem()
            .map(|s| s.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        if stem == "cl" || stem == "clang-cl" {
            ToolchainPlatform::Msvc
        } else if stem.contains("clang") || (os == Os::MacOs && stem == "cc") {
            if os == Os::MacOs {
                ToolchainPlatform::AppleClang
            } else {
                ToolchainPlatform::Clang
            }
        } else {
            ToolchainPlatform::Gcc
        }
    }
}

/// Trait for C compiler drivers.
///
/// Each toolchain knows the command shape of its own compiler.
pub trait Toolchain: Send + Sync {
    /// Get the toolchain platform.
    fn platform(&self) -> ToolchainPlatform;

    /// Get the C compiler path.
    fn compiler_path(&self) -> &Path;

    /// Generate the single compile-and-link command for an extension module.
    fn link_extension_command(&self, input: &ExtensionLinkInput) -> CommandSpec;
}

/// Default C compiler driver for a platform.
pub fn default_compiler(profile: &PlatformProfile) -> PathBuf {
    match profile.os {
        Os::Windows => PathBuf::from("cl"),
        Os::Linux | Os::MacOs => PathBuf::from("cc"),
    }
}

/// Select the C toolchain for a platform, honoring a configured compiler.
pub fn select_toolchain(cc: Option<&Path>, profile: &PlatformProfile) -> Box<dyn Toolchain> {
    let cc = cc
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_compiler(profile));

    match ToolchainPlatform::infer(&cc, profile.os) {
        ToolchainPlatform::Msvc => Box::new(MsvcToolchain::new(cc)),
        family => Box::new(GccToolchain::new(cc, family)),
    }
}
