//! Source discovery: walks a scan root the way git sees it and keeps files
//! with a supported, selected language.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::ScanConfig;
use crate::error::{EngineError, Result};
use crate::ir::Language;

/// A file selected for scanning.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub language: Language,
}

/// Collect scannable files under `root`, sorted by path.
///
/// Honors `.gitignore` (even outside a git checkout), skips hidden entries
/// and drops anything matching one of `config.exclude`. A `root` that is a
/// file is returned on its own when its language is selected.
pub fn discover(root: &Path, config: &ScanConfig) -> Result<Vec<DiscoveredFile>> {
    if !root.exists() {
        return Err(EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", root.display()),
        )));
    }
    let excludes = compile_excludes(&config.exclude)?;

    if root.is_file() {
        let language = language_of(root);
        return Ok(if config.wants(language) {
            vec![DiscoveredFile {
                path: root.to_path_buf(),
                language,
            }]
        } else {
            Vec::new()
        });
    }

    let walker = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .build();

    let mut files = Vec::new();
    for entry in walker.filter_map(walk_entry) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let language = language_of(path);
        if !config.wants(language) {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        if excludes
            .iter()
            .any(|pattern| pattern.matches_path(relative) || pattern.matches_path(path))
        {
            debug!(file = %path.display(), "excluded");
            continue;
        }
        files.push(DiscoveredFile {
            path: path.to_path_buf(),
            language,
        });
    }
    files.sort();
    Ok(files)
}

/// Unreadable entries are logged and skipped; the rest of the walk goes on.
fn walk_entry(
    entry: std::result::Result<ignore::DirEntry, ignore::Error>,
) -> Option<ignore::DirEntry> {
    match entry {
        Ok(entry) => Some(entry),
        Err(err) => {
            warn!(error = %err, "cannot walk entry, skipping");
            None
        }
    }
}

fn language_of(path: &Path) -> Language {
    path.extension()
        .and_then(|e| e.to_str())
        .map(Language::from_extension)
        .unwrap_or(Language::Unknown)
}

fn compile_excludes(patterns: &[String]) -> Result<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p)
                .map_err(|e| EngineError::Config(format!("invalid exclude pattern '{p}': {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/lib")).unwrap();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(root.join("src/app.js"), "run();").unwrap();
        fs::write(root.join("src/nested/util.py"), "x = 1").unwrap();
        fs::write(root.join("src/Main.java"), "class Main {}").unwrap();
        fs::write(root.join("src/readme.md"), "# docs").unwrap();
        fs::write(root.join("node_modules/lib/index.js"), "run();").unwrap();
        fs::write(root.join("build/out.js"), "run();").unwrap();
        fs::write(root.join(".gitignore"), "build/\n").unwrap();
        dir
    }

    fn names(root: &Path, files: &[DiscoveredFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| {
                f.path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn honors_gitignore_excludes_and_extensions() {
        let dir = tree();
        let files = discover(dir.path(), &ScanConfig::default()).unwrap();
        assert_eq!(
            names(dir.path(), &files),
            vec!["src/Main.java", "src/app.js", "src/nested/util.py"]
        );
        assert_eq!(files[0].language, Language::Java);
    }

    #[test]
    fn language_filter_applies() {
        let dir = tree();
        let config = ScanConfig {
            languages: vec![Language::Python],
            ..ScanConfig::default()
        };
        let files = discover(dir.path(), &config).unwrap();
        assert_eq!(names(dir.path(), &files), vec!["src/nested/util.py"]);
    }

    #[test]
    fn single_file_root() {
        let dir = tree();
        let file = dir.path().join("src/app.js");
        let files = discover(&file, &ScanConfig::default()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].language, Language::JavaScript);

        let md = dir.path().join("src/readme.md");
        assert!(discover(&md, &ScanConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn bad_exclude_pattern_is_a_config_error() {
        let dir = tree();
        let config = ScanConfig {
            exclude: vec!["[".into()],
            ..ScanConfig::default()
        };
        assert!(matches!(
            discover(dir.path(), &config),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover(&dir.path().join("nope"), &ScanConfig::default()),
            Err(EngineError::Io(_))
        ));
    }

    #[test]
    fn walk_errors_are_skipped() {
        let denied = ignore::Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "permission denied",
        ));
        assert!(walk_entry(Err(denied)).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_does_not_abort_discovery() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tree();
        let locked = dir.path().join("src/locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("hidden.js"), "run();").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let files = discover(dir.path(), &ScanConfig::default());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let names = names(dir.path(), &files.unwrap());
        assert!(names.contains(&"src/app.js".to_string()));
        assert!(names.contains(&"src/nested/util.py".to_string()));
    }
}
