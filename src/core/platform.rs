//! Platform profile resolution.
//!
//! A [`PlatformProfile`] captures every naming and linking convention that
//! differs between operating systems. It is resolved once per run and passed
//! by reference to every stage; nothing downstream inspects the host OS.

use std::fmt;

use serde::Serialize;

use crate::builder::errors::BuildError;

/// Operating systems with a platform profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    MacOs,
    Windows,
}

impl Os {
    /// All supported operating systems.
    pub const ALL: [Os; 3] = [Os::Linux, Os::MacOs, Os::Windows];

    /// Parse an OS identifier as reported by `std::env::consts::OS`.
    pub fn from_identifier(id: &str) -> Option<Self> {
        match id.to_ascii_lowercase().as_str() {
            "linux" => Some(Os::Linux),
            "macos" | "darwin" => Some(Os::MacOs),
            "windows" | "win32" => Some(Os::Windows),
            _ => None,
        }
    }

    /// Returns the lowercase string identifier for this OS.
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::MacOs => "macos",
            Os::Windows => "windows",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Naming and linking conventions of one operating system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformProfile {
    /// The operating system this profile describes
    pub os: Os,
    /// Shared library extension, without the dot
    pub library_extension: &'static str,
    /// Shared library file-name prefix
    pub library_prefix: &'static str,
    /// Extension of the link-time import descriptor, where one is required
    pub import_descriptor_suffix: Option<&'static str>,
    /// Linker flag that makes a module find libraries next to itself
    pub runtime_search_path_flag: Option<&'static str>,
}

impl PlatformProfile {
    /// Resolve the profile for an OS identifier.
    pub fn resolve(os: &str) -> Result<Self, BuildError> {
        Os::from_identifier(os)
            .map(Self::for_os)
            .ok_or_else(|| BuildError::PlatformConfiguration { os: os.to_string() })
    }

    /// Resolve the profile for the host running this process.
    pub fn host() -> Result<Self, BuildError> {
        Self::resolve(std::env::consts::OS)
    }

    /// The profile for a known OS.
    pub fn for_os(os: Os) -> Self {
        match os {
            Os::Linux => PlatformProfile {
                os,
                library_extension: "so",
                library_prefix: "lib",
                import_descriptor_suffix: None,
                runtime_search_path_flag: Some("-Wl,-rpath,$ORIGIN"),
            },
            Os::MacOs => PlatformProfile {
                os,
                library_extension: "dylib",
                library_prefix: "lib",
                import_descriptor_suffix: None,
                runtime_search_path_flag: Some("-Wl,-rpath,@loader_path"),
            },
            Os::Windows => PlatformProfile {
                os,
                library_extension: "dll",
                library_prefix: "",
                import_descriptor_suffix: Some("lib"),
                runtime_search_path_flag: None,
            },
        }
    }

    /// Shared library file name for a library stem (`ta_go` -> `libta_go.so`).
    pub fn library_file_name(&self, stem: &str) -> String {
        format!("{}{}.{}", self.library_prefix, stem, self.library_extension)
    }

    /// Canonical import descriptor file name (`ta_go` -> `ta_go.lib`).
    pub fn import_descriptor_file_name(&self, stem: &str) -> Option<String> {
        self.import_descriptor_suffix
            .map(|suffix| format!("{}.{}", stem, suffix))
    }

    /// Glob matching this platform's shared libraries (`*.so`).
    pub fn library_glob(&self) -> String {
        format!("*.{}", self.library_extension)
    }

    /// Shared library extensions of every other platform.
    pub fn foreign_library_extensions(&self) -> Vec<&'static str> {
        Os::ALL
            .iter()
            .filter(|os| **os != self.os)
            .map(|os| Self::for_os(*os).library_extension)
            .collect()
    }

    /// Whether the default C toolchain exports module entry points without
    /// an explicit visibility marker.
    pub fn exports_entry_points_by_default(&self) -> bool {
        self.os != Os::Windows
    }

    /// Extra linker flags for host runtime symbols left unresolved at link time.
    pub fn host_symbol_flags(&self) -> &'static [&'static str] {
        match self.os {
            Os::MacOs => &["-undefined", "dynamic_lookup"],
            Os::Linux | Os::Windows => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_profile() {
        let p = PlatformProfile::resolve("linux").unwrap();
        assert_eq!(p.os, Os::Linux);
        assert_eq!(p.library_extension, "so");
        assert_eq!(p.library_prefix, "lib");
        assert_eq!(p.import_descriptor_suffix, None);
        assert_eq!(p.runtime_search_path_flag, Some("-Wl,-rpath,$ORIGIN"));
    }

    #[test]
    fn test_macos_profile() {
        for id in ["macos", "darwin"] {
            let p = PlatformProfile::resolve(id).unwrap();
            assert_eq!(p.os, Os::MacOs);
            assert_eq!(p.library_extension, "dylib");
            assert_eq!(p.library_prefix, "lib");
            assert_eq!(p.import_descriptor_suffix, None);
            assert_eq!(p.runtime_search_path_flag, Some("-Wl,-rpath,@loader_path"));
        }
    }

    #[test]
    fn test_windows_profile() {
        let p = PlatformProfile::resolve("windows").unwrap();
        assert_eq!(p.os, Os::Windows);
        assert_eq!(p.library_extension, "dll");
        assert_eq!(p.library_prefix, "");
        assert_eq!(p.import_descriptor_suffix, Some("lib"));
        assert_eq!(p.runtime_search_path_flag, None);
    }

    #[test]
    fn test_unsupported_platform_is_configuration_error() {
        for id in ["freebsd", "", "solaris"] {
            let err = PlatformProfile::resolve(id).unwrap_err();
            assert!(matches!(err, BuildError::PlatformConfiguration { .. }));
        }
    }

    #[test]
    fn test_each_identifier_selects_exactly_one_variant() {
        let profiles: Vec<_> = Os::ALL
            .iter()
            .map(|os| PlatformProfile::resolve(os.as_str()).unwrap())
            .collect();

        for (i, a) in profiles.iter().enumerate() {
            for b in &profiles[i + 1..] {
                assert_ne!(a.library_extension, b.library_extension);
            }
        }
    }

    #[test]
    fn test_library_file_names() {
        let linux = PlatformProfile::for_os(Os::Linux);
        assert_eq!(linux.library_file_name("ta_go"), "libta_go.so");
        assert_eq!(linux.import_descriptor_file_name("ta_go"), None);

        let windows = PlatformProfile::for_os(Os::Windows);
        assert_eq!(windows.library_file_name("ta_go"), "ta_go.dll");
        assert_eq!(
            windows.import_descriptor_file_name("ta_go").as_deref(),
            Some("ta_go.lib")
        );

        let macos = PlatformProfile::for_os(Os::MacOs);
        assert_eq!(macos.library_file_name("tav_go"), "libtav_go.dylib");
    }

    #[test]
    fn test_foreign_extensions_exclude_own() {
        for os in Os::ALL {
            let p = PlatformProfile::for_os(os);
            let foreign = p.foreign_library_extensions();
            assert_eq!(foreign.len(), 2);
            assert!(!foreign.contains(&p.library_extension));
        }
    }

    #[test]
    fn test_entry_point_export_defaults() {
        assert!(PlatformProfile::for_os(Os::Linux).exports_entry_points_by_default());
        assert!(PlatformProfile::for_os(Os::MacOs).exports_entry_points_by_default());
        assert!(!PlatformProfile::for_os(Os::Windows).exports_entry_points_by_default());
    }
}
