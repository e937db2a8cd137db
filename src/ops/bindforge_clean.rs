//! Implementation of `bindforge clean`.

use std::path::PathBuf;

use anyhow::Result;

use crate::core::artifact::BuildArtifact;
use crate::core::platform::{Os, PlatformProfile};
use crate::core::Workspace;
use crate::ops::bindforge_build::select_packages;
use crate::util::config::Config;
use crate::util::fs::{glob_files, remove_dir_all_if_exists, remove_file_if_exists};

/// Options for the clean command.
#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    /// Specific packages to clean (empty = all)
    pub packages: Vec<String>,

    /// Also remove the bundle from the dist directory
    pub dist: bool,

    /// Distribution directory, overriding `build.dist-dir`
    pub dist_dir: Option<PathBuf>,
}

/// Result of a clean.
#[derive(Debug, Default)]
pub struct CleanResult {
    pub removed: Vec<PathBuf>,
}

/// Remove generated artifacts.
///
/// Package directories also hold hand-written files (the generator script,
/// `__init__.py`), so only files a build produces are removed.
pub fn clean(ws: &Workspace, config: &Config, opts: &CleanOptions) -> Result<CleanResult> {
    let packages = select_packages(ws, &opts.packages)?;
    let profile = PlatformProfile::host()?;
    let dist_dir = ws.dist_dir(opts.dist_dir.as_deref().or(config.build.dist_dir.as_deref()));
    if opts.dist {
        ws.check_dist_dir(&dist_dir)?;
    }
    let mut result = CleanResult::default();

    for spec in &packages {
        let package_dir = ws.package_dir(&spec.name);
        if !package_dir.is_dir() {
            continue;
        }
        let artifact = BuildArtifact::plan(spec, &package_dir, &profile);

        let mut candidates = vec![
            artifact.shared_library_path.clone(),
            artifact.header_path(),
            artifact.emitted_descriptor_path(),
            artifact.glue_source_path.clone(),
        ];
        candidates.extend(artifact.canonical_descriptor_path(&profile));
        candidates.extend(glob_files(&package_dir, &module_patterns(&spec.name, &profile))?);

        for path in candidates {
            if remove_file_if_exists(&path)? {
                tracing::debug!("removed {}", path.display());
                result.removed.push(path);
            }
        }
    }

    if opts.dist {
        let bundle_dir = dist_dir.join(ws.bundle_name());
        if bundle_dir.exists() {
            remove_dir_all_if_exists(&bundle_dir)?;
            result.removed.push(bundle_dir);
        }
        let manifest_path = ws.bundle_manifest_path(&dist_dir);
        if remove_file_if_exists(&manifest_path)? {
            result.removed.push(manifest_path);
        }
    }

    Ok(result)
}

/// Compiled modules for any interpreter suffix, plus compiler by-products.
fn module_patterns(name: &str, profile: &PlatformProfile) -> Vec<String> {
    let mut patterns = vec![format!("_{}.so", name), format!("_{}.*.so", name)];
    if profile.os == Os::Windows {
        patterns.extend([
            format!("_{}*.pyd", name),
            format!("_{}*.lib", name),
            format!("_{}*.exp", name),
            format!("{}.obj", name),
        ]);
    }
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::Manifest;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn workspace(root: &Path) -> Workspace {
        let path = root.join("Bindforge.toml");
        let manifest = Manifest::parse(
            r#"
[bundle]
name = "banbta"

[packages]
ta = "./ta"
"#,
            &path,
        )
        .unwrap();
        Workspace::new(&path, manifest)
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_clean_keeps_hand_written_files() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(tmp.path());
        let pkg = ws.package_dir("ta");
        fs::create_dir_all(&pkg).unwrap();
        for name in [
            "libta_go.so",
            "libta_go.h",
            "ta.c",
            "_ta.cpython-312-x86_64-linux-gnu.so",
            "build.py",
            "__init__.py",
        ] {
            fs::write(pkg.join(name), "x").unwrap();
        }

        let result = clean(&ws, &Config::default(), &CleanOptions::default()).unwrap();
        assert_eq!(result.removed.len(), 4);

        let mut left: Vec<_> = fs::read_dir(&pkg)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["__init__.py", "build.py"]);
    }

    #[test]
    fn test_clean_dist() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(tmp.path());
        let dist = ws.dist_dir(None);
        fs::create_dir_all(dist.join("banbta").join("ta")).unwrap();
        fs::write(ws.bundle_manifest_path(&dist), "{}").unwrap();

        let opts = CleanOptions {
            dist: true,
            ..Default::default()
        };
        let result = clean(&ws, &Config::default(), &opts).unwrap();

        assert_eq!(result.removed.len(), 2);
        assert!(!dist.join("banbta").exists());
        assert!(!ws.bundle_manifest_path(&dist).exists());
    }

    #[test]
    fn test_clean_dist_refuses_workspace_root() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(tmp.path());
        let pkg = ws.package_dir("ta");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("__init__.py"), "x").unwrap();
        fs::write(pkg.join("ta.c"), "x").unwrap();

        let opts = CleanOptions {
            dist: true,
            dist_dir: Some(PathBuf::from(".")),
            ..Default::default()
        };
        assert!(clean(&ws, &Config::default(), &opts).is_err());
        assert!(pkg.join("__init__.py").is_file());
        assert!(pkg.join("ta.c").is_file());
    }

    #[test]
    fn test_windows_module_patterns() {
        let patterns = module_patterns("ta", &PlatformProfile::for_os(Os::Windows));
        assert!(patterns.contains(&"_ta*.pyd".to_string()));
        assert!(patterns.contains(&"ta.obj".to_string()));
    }
}
