//! Path validity predicates consulted by the walker.

use crate::config::PathPattern;
use crate::error::{IndexError, Result};
use regex_lite::Regex;
use std::path::{Path, PathBuf};

/// Decides which paths the walker indexes.
///
/// The walker only branches on these answers; it never reports an invalid
/// path as an error.
pub trait Validator {
    fn is_valid_file(&self, path: &Path) -> bool;

    fn is_valid_dir(&self, path: &Path) -> bool;

    /// Whether `path` matches a force-index pattern.
    fn matches_force_index(&self, path: &Path) -> bool;

    /// Whether any force-index pattern is configured at all.
    fn has_force_index_patterns(&self) -> bool;
}

/// Accepts every path and forces nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn is_valid_file(&self, _path: &Path) -> bool {
        true
    }

    fn is_valid_dir(&self, _path: &Path) -> bool {
        true
    }

    fn matches_force_index(&self, _path: &Path) -> bool {
        false
    }

    fn has_force_index_patterns(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
enum CompiledPattern {
    Prefix(PathBuf),
    Regex(Regex),
}

/// A set of path patterns anchored at a dataset root.
///
/// Plain patterns are paths relative to the root and match that path and
/// everything below it. Regex patterns are searched in the root-relative
/// path, written with a leading `/` and forward slashes (`/sub-01/.cache`).
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    root: PathBuf,
    patterns: Vec<CompiledPattern>,
}

impl PatternSet {
    pub fn new(root: &Path, patterns: &[PathPattern]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| match p {
                PathPattern::Path(rel) => Ok(CompiledPattern::Prefix(root.join(rel))),
                PathPattern::Regex { regex } => Regex::new(regex)
                    .map(CompiledPattern::Regex)
                    .map_err(|e| IndexError::Pattern {
                        entity: format!("path pattern {regex}"),
                        message: e.to_string(),
                    }),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            root: root.to_path_buf(),
            patterns,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, path: &Path) -> bool {
        let relative = self.relative(path);
        self.patterns.iter().any(|p| match p {
            CompiledPattern::Prefix(prefix) => path.starts_with(prefix),
            CompiledPattern::Regex(re) => re.is_match(&relative),
        })
    }

    fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let joined = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        format!("/{joined}")
    }
}

/// Validator driven by ignore and force-index pattern lists.
#[derive(Debug, Clone, Default)]
pub struct PatternValidator {
    ignore: PatternSet,
    force_index: PatternSet,
}

impl PatternValidator {
    pub fn new(root: &Path, ignore: &[PathPattern], force_index: &[PathPattern]) -> Result<Self> {
        Ok(Self {
            ignore: PatternSet::new(root, ignore)?,
            force_index: PatternSet::new(root, force_index)?,
        })
    }
}

impl Validator for PatternValidator {
    fn is_valid_file(&self, path: &Path) -> bool {
        !self.ignore.matches(path)
    }

    fn is_valid_dir(&self, path: &Path) -> bool {
        !self.ignore.matches(path)
    }

    fn matches_force_index(&self, path: &Path) -> bool {
        self.force_index.matches(path)
    }

    fn has_force_index_patterns(&self) -> bool {
        !self.force_index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regex(s: &str) -> PathPattern {
        PathPattern::Regex {
            regex: s.to_string(),
        }
    }

    #[test]
    fn plain_patterns_cover_the_subtree() {
        let root = Path::new("/data");
        let set = PatternSet::new(root, &[PathPattern::Path("code".into())]).unwrap();
        assert!(set.matches(Path::new("/data/code")));
        assert!(set.matches(Path::new("/data/code/script.py")));
        assert!(!set.matches(Path::new("/data/codebase")));
        assert!(!set.matches(Path::new("/data/sub-01/code")));
    }

    #[test]
    fn regex_patterns_ignore_root_location() {
        let root = Path::new("/tmp/.hidden-root");
        let set = PatternSet::new(root, &[regex(r"/\.")]).unwrap();
        assert!(!set.matches(Path::new("/tmp/.hidden-root/sub-01")));
        assert!(set.matches(Path::new("/tmp/.hidden-root/sub-01/.DS_Store")));
    }

    #[test]
    fn pattern_validator_answers() {
        let root = Path::new("/data");
        let v = PatternValidator::new(
            root,
            &[PathPattern::Path("sourcedata".into())],
            &[regex(r"^/extra")],
        )
        .unwrap();

        assert!(!v.is_valid_dir(Path::new("/data/sourcedata")));
        assert!(v.is_valid_dir(Path::new("/data/sub-01")));
        assert!(v.is_valid_file(Path::new("/data/sub-01/x.txt")));
        assert!(v.matches_force_index(Path::new("/data/extra/deep")));
        assert!(v.has_force_index_patterns());
        assert!(!AcceptAll.has_force_index_patterns());
    }

    #[test]
    fn bad_regex_is_rejected() {
        let err = PatternSet::new(Path::new("/"), &[regex("(")]).unwrap_err();
        assert!(matches!(err, IndexError::Pattern { .. }));
    }
}
