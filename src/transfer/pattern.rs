//! ANT-style file pattern matching over a workspace
//!
//! `*` matches within one path segment, `**` across segments and `?` one
//! character. Several patterns may be given in one string separated by commas
//! or newlines; a file matches when any include matches and no exclude does.
//! A pattern ending in `/` selects everything below that directory.

use crate::core::config::Entry;
use crate::core::error::{PublishError, PublishResult};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// ANT's default excludes: VCS metadata and editor droppings
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/*~",
    "**/#*#",
    "**/.#*",
    "**/%*%",
    "**/._*",
    "**/CVS",
    "**/CVS/**",
    "**/.cvsignore",
    "**/SCCS",
    "**/SCCS/**",
    "**/vssver.scc",
    "**/.svn",
    "**/.svn/**",
    "**/.DS_Store",
    "**/.git",
    "**/.git/**",
    "**/.gitattributes",
    "**/.gitignore",
    "**/.gitmodules",
    "**/.hg",
    "**/.hg/**",
    "**/.hgignore",
    "**/.hgsub",
    "**/.hgsubstate",
    "**/.hgtags",
    "**/.bzr",
    "**/.bzr/**",
    "**/.bzrignore",
];

/// Split a comma/newline separated pattern list into normalised patterns
pub fn split_patterns(raw: &str) -> Vec<String> {
    raw.split([',', '\n', '\r'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(normalize_pattern)
        .collect()
}

fn normalize_pattern(pattern: &str) -> String {
    let mut pattern = pattern.replace('\\', "/");
    while let Some(stripped) = pattern.strip_prefix("./") {
        pattern = stripped.to_string();
    }
    let pattern = escape_literals(pattern.trim_start_matches('/'));
    if pattern.ends_with('/') {
        format!("{}**", pattern)
    } else {
        pattern
    }
}

/// Only `*`, `**` and `?` are special in ANT patterns; brackets and braces
/// are part of file names
fn escape_literals(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '[' => escaped.push_str("[[]"),
            ']' => escaped.push_str("[]]"),
            '{' => escaped.push_str("[{]"),
            '}' => escaped.push_str("[}]"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn build_set(patterns: &[String]) -> PublishResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .backslash_escape(false)
            .build()
            .map_err(|e| PublishError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| PublishError::InvalidPattern {
        pattern: patterns.join(","),
        message: e.to_string(),
    })
}

/// `/`-joined form of a relative path, the shape globs are written against
fn glob_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Compiled include/exclude pattern set
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    includes: GlobSet,
    excludes: GlobSet,
    /// Directories whose whole content is excluded (`dir/**` excludes)
    pruned_dirs: GlobSet,
}

impl PatternMatcher {
    /// Matcher for `includes` with ANT default excludes applied
    pub fn new(includes: &str) -> PublishResult<Self> {
        Self::with_excludes(includes, None, true)
    }

    pub fn with_excludes(
        includes: &str,
        excludes: Option<&str>,
        default_excludes: bool,
    ) -> PublishResult<Self> {
        let mut exclude_patterns = excludes.map(split_patterns).unwrap_or_default();
        if default_excludes {
            exclude_patterns.extend(DEFAULT_EXCLUDES.iter().map(|p| p.to_string()));
        }

        let pruned_patterns: Vec<String> = exclude_patterns
            .iter()
            .filter_map(|p| p.strip_suffix("/**"))
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            includes: build_set(&split_patterns(includes))?,
            excludes: build_set(&exclude_patterns)?,
            pruned_dirs: build_set(&pruned_patterns)?,
        })
    }

    pub fn for_entry(entry: &Entry) -> PublishResult<Self> {
        Self::with_excludes(
            &entry.source_pattern,
            entry.excludes.as_deref(),
            entry.default_excludes,
        )
    }

    /// Whether no include pattern was given (matches nothing)
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty()
    }

    /// Whether a workspace-relative file path is selected
    pub fn is_match(&self, relative: &Path) -> bool {
        let path = glob_path(relative);
        self.includes.is_match(&path) && !self.excludes.is_match(&path)
    }

    /// A directory is skipped only when an exclude covers everything below it
    fn prunes_dir(&self, relative: &Path) -> bool {
        self.pruned_dirs.is_match(glob_path(relative))
    }

    /// Lazily enumerate matching regular files below `root`.
    ///
    /// Each call starts a fresh traversal. Entries are visited in file name
    /// order, so a run over an unchanged tree is deterministic. A missing
    /// root yields nothing.
    pub fn matches(&self, root: &Path) -> Matches<'_> {
        let walker = if self.is_empty() || !root.is_dir() {
            None
        } else {
            Some(
                WalkDir::new(root)
                    .follow_links(true)
                    .sort_by_file_name()
                    .into_iter(),
            )
        };

        Matches {
            matcher: self,
            root: root.to_path_buf(),
            walker,
        }
    }
}

/// Iterator over workspace-relative paths of matching files
pub struct Matches<'a> {
    matcher: &'a PatternMatcher,
    root: PathBuf,
    walker: Option<walkdir::IntoIter>,
}

impl Iterator for Matches<'_> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        let walker = self.walker.as_mut()?;

        loop {
            let entry = match walker.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable workspace entry");
                    continue;
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative.to_path_buf();

            if entry.file_type().is_dir() {
                if self.matcher.prunes_dir(&relative) {
                    walker.skip_current_dir();
                }
                continue;
            }

            if entry.file_type().is_file() && self.matcher.is_match(&relative) {
                return Some(relative);
            }
        }
    }
}

/// Convenience form: enumerate files under `root` matching `pattern`
pub fn match_files(root: &Path, pattern: &str) -> PublishResult<Vec<PathBuf>> {
    Ok(PatternMatcher::new(pattern)?.matches(root).collect())
}
