//! Import specifier resolution.
//!
//! Resolves a specifier declared in one module to the canonical path of
//! the file it names: literal path first, then extension inference, then
//! an `index` file when the literal path is a directory.

use crate::error::BuildError;
use std::path::{Path, PathBuf};

/// Resolver with the configured extension-inference list.
#[derive(Debug, Clone)]
pub struct Resolver {
    extensions: Vec<String>,
}

impl Resolver {
    #[must_use]
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    /// Resolve `specifier` as declared in the module at `from`.
    ///
    /// Relative specifiers resolve against the importing module's
    /// directory; absolute specifiers are taken as-is. Bare specifiers
    /// have no search path in this bundler and fail with
    /// [`BuildError::Resolution`].
    pub fn resolve(&self, specifier: &str, from: &Path) -> Result<PathBuf, BuildError> {
        let target = if specifier.starts_with("./") || specifier.starts_with("../") {
            from.parent().unwrap_or(Path::new(".")).join(specifier)
        } else if Path::new(specifier).is_absolute() {
            PathBuf::from(specifier)
        } else {
            return Err(BuildError::Resolution {
                specifier: specifier.to_string(),
                from: from.to_path_buf(),
                message: "bare specifiers are not supported; use a relative path".to_string(),
            });
        };

        if let Some(found) = self.probe(&target) {
            return canonical(&found, specifier, from);
        }

        Err(BuildError::Resolution {
            specifier: specifier.to_string(),
            from: from.to_path_buf(),
            message: "file not found".to_string(),
        })
    }

    /// Literal path, then appended extensions, then directory index.
    fn probe(&self, target: &Path) -> Option<PathBuf> {
        if target.is_file() {
            return Some(target.to_path_buf());
        }

        for ext in &self.extensions {
            let with_ext = PathBuf::from(format!("{}{ext}", target.display()));
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }

        if target.is_dir() {
            for ext in &self.extensions {
                let index = target.join(format!("index{ext}"));
                if index.is_file() {
                    return Some(index);
                }
            }
        }

        None
    }
}

fn canonical(path: &Path, specifier: &str, from: &Path) -> Result<PathBuf, BuildError> {
    dunce::canonicalize(path).map_err(|e| BuildError::Resolution {
        specifier: specifier.to_string(),
        from: from.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn resolver() -> Resolver {
        Resolver::new(vec![".js".to_string(), ".json".to_string()])
    }

    #[test]
    fn resolves_literal_relative_path() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("util.js"), "export const x = 1;").unwrap();
        let from = dir.path().join("main.js");

        let path = resolver().resolve("./util.js", &from).unwrap();
        assert!(path.ends_with("util.js"));
    }

    #[test]
    fn infers_extension() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("util.js"), "export const x = 1;").unwrap();
        let from = dir.path().join("main.js");

        let path = resolver().resolve("./util", &from).unwrap();
        assert!(path.ends_with("util.js"));
    }

    #[test]
    fn literal_match_beats_extension_inference() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("data"), "raw").unwrap();
        std::fs::write(dir.path().join("data.js"), "export default 1;").unwrap();
        let from = dir.path().join("main.js");

        let path = resolver().resolve("./data", &from).unwrap();
        assert!(path.ends_with("data"));
    }

    #[test]
    fn falls_back_to_directory_index() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("lib")).unwrap();
        std::fs::write(dir.path().join("lib/index.js"), "export const x = 1;").unwrap();
        let from = dir.path().join("main.js");

        let path = resolver().resolve("./lib", &from).unwrap();
        assert!(path.ends_with("lib/index.js") || path.ends_with("lib\\index.js"));
    }

    #[test]
    fn missing_file_is_a_resolution_error() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("main.js");

        let err = resolver().resolve("./nope", &from).unwrap_err();
        assert_eq!(err.code(), "RESOLUTION_ERROR");
    }

    #[test]
    fn bare_specifier_is_a_resolution_error() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("main.js");

        let err = resolver().resolve("lodash", &from).unwrap_err();
        assert_eq!(err.code(), "RESOLUTION_ERROR");
    }
}
