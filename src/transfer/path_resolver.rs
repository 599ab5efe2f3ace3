//! Mapping of workspace files to share-relative destinations
//!
//! Local paths use the host separator; share paths are always `/`-separated
//! and relative to the share root.

use crate::core::error::{PublishError, PublishResult};
use crate::core::traits::BuildContext;
use serde::Serialize;
use std::fmt;
use std::path::{Component, Path};

/// Normalised path below a share root (`a/b/c.txt`, empty for the root)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RemotePath(String);

impl RemotePath {
    /// The share root itself
    pub fn root() -> Self {
        Self::default()
    }

    /// Normalise a `/` or `\` separated path.
    ///
    /// Empty and `.` segments are dropped; `..` is rejected.
    pub fn parse(raw: &str) -> PublishResult<Self> {
        let mut segments = Vec::new();
        for segment in raw.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    return Err(PublishError::InvalidDestination {
                        destination: raw.to_string(),
                    });
                }
                other => segments.push(other),
            }
        }
        Ok(Self(segments.join("/")))
    }

    /// Convert a relative local path
    pub fn from_local(path: &Path) -> PublishResult<Self> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => {
                    return Err(PublishError::InvalidDestination {
                        destination: path.display().to_string(),
                    });
                }
            }
        }
        Ok(Self(segments.join("/")))
    }

    pub fn join(&self, other: &RemotePath) -> RemotePath {
        match (self.is_root(), other.is_root()) {
            (true, _) => other.clone(),
            (_, true) => self.clone(),
            _ => Self(format!("{}/{}", self.0, other.0)),
        }
    }

    /// Parent directory; the root is its own parent
    pub fn parent(&self) -> RemotePath {
        match self.0.rfind('/') {
            Some(idx) => Self(self.0[..idx].to_string()),
            None => Self::root(),
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0.rsplit('/').next().filter(|name| !name.is_empty())
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Resolves destinations for one entry; the template is expanded once
#[derive(Debug, Clone)]
pub struct PathResolver {
    destination: RemotePath,
    flatten: bool,
}

impl PathResolver {
    pub fn new(template: &str, flatten: bool, build: &BuildContext) -> PublishResult<Self> {
        let expanded = build.expand(template);
        Ok(Self {
            destination: RemotePath::parse(&expanded)?,
            flatten,
        })
    }

    /// Expanded destination directory of the entry
    pub fn destination(&self) -> &RemotePath {
        &self.destination
    }

    /// Destination of a file matched at `matched` (relative to the workspace)
    pub fn resolve(&self, matched: &Path) -> PublishResult<RemotePath> {
        let relative = if self.flatten {
            let name = matched.file_name().ok_or_else(|| PublishError::InvalidDestination {
                destination: matched.display().to_string(),
            })?;
            RemotePath::from_local(Path::new(name))?
        } else {
            RemotePath::from_local(matched)?
        };

        Ok(self.destination.join(&relative))
    }
}

/// One-shot form of [`PathResolver::resolve`]
pub fn resolve(
    matched: &Path,
    template: &str,
    flatten: bool,
    build: &BuildContext,
) -> PublishResult<RemotePath> {
    PathResolver::new(template, flatten, build)?.resolve(matched)
}
