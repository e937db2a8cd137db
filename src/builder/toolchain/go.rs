//! Go toolchain: builds packages as C shared libraries.

use std::path::{Path, PathBuf};

use super::CommandSpec;

/// The Go toolchain in `c-shared` build mode.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    /// Path to the `go` binary
    pub go: PathBuf,
    /// Extra `go build` flags
    pub flags: Vec<String>,
}

impl GoToolchain {
    /// Create a Go toolchain, defaulting to `go` on PATH.
    pub fn new(go: Option<&Path>, flags: Vec<String>) -> Self {
        GoToolchain {
            go: go.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("go")),
            flags,
        }
    }

    /// `go build -buildmode=c-shared [flags] -o <output> <source>`
    pub fn shared_library_command(&self, output: &Path, source: &str) -> CommandSpec {
        CommandSpec::new(&self.go)
            .arg("build")
            .arg("-buildmode=c-shared")
            .args(self.flags.iter().cloned())
            .arg("-o")
            .arg(output.display().to_string())
            .arg(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_library_command() {
        let go = GoToolchain::new(None, vec!["-trimpath".to_string()]);
        let cmd = go.shared_library_command(
            Path::new("banbta/ta/libta_go.so"),
            "github.com/banbox/banta/python/ta",
        );

        assert_eq!(cmd.program, PathBuf::from("go"));
        assert_eq!(
            cmd.args,
            vec![
                "build",
                "-buildmode=c-shared",
                "-trimpath",
                "-o",
                "banbta/ta/libta_go.so",
                "github.com/banbox/banta/python/ta",
            ]
        );
    }
}
