//! Entry copier - transfers the files of one entry to the share
//!
//! Files are copied strictly one after another. A failure on one file is
//! recorded and the walk continues; only connection-level errors abort.

use crate::core::config::Entry;
use crate::core::error::{PublishError, PublishResult};
use crate::core::traits::BuildContext;
use crate::transfer::path_resolver::{PathResolver, RemotePath};
use crate::transfer::pattern::PatternMatcher;
use crate::transfer::sink::RemoteFileSink;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A file that could not be transferred
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferFailure {
    /// Workspace-relative source path
    pub local_path: PathBuf,

    /// Destination below the share root, when it could be resolved
    pub destination: Option<RemotePath>,

    /// Stable error code (e.g. `REMOTE_IO`)
    pub code: String,

    /// Error detail
    pub message: String,
}

impl TransferFailure {
    fn new(local_path: &Path, destination: Option<RemotePath>, error: &PublishError) -> Self {
        Self {
            local_path: local_path.to_path_buf(),
            destination,
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Copies entries through one connected sink
pub struct EntryCopier<'a> {
    sink: &'a dyn RemoteFileSink,
    build: &'a BuildContext,
    copied: usize,
    failures: Vec<TransferFailure>,
}

impl<'a> EntryCopier<'a> {
    pub fn new(sink: &'a dyn RemoteFileSink, build: &'a BuildContext) -> Self {
        Self {
            sink,
            build,
            copied: 0,
            failures: Vec::new(),
        }
    }

    /// Files transferred by every `copy` so far, including an aborted one
    pub fn files_copied(&self) -> usize {
        self.copied
    }

    /// Failures recorded by every `copy` so far
    pub fn failures(&self) -> &[TransferFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<TransferFailure> {
        self.failures
    }

    /// Copy every file the entry selects; returns the number transferred.
    ///
    /// An entry with an empty pattern copies nothing and performs no I/O.
    pub async fn copy(&mut self, entry: &Entry) -> PublishResult<usize> {
        if entry.is_noop() {
            debug!("entry has no source pattern, skipping");
            return Ok(0);
        }

        let matcher = PatternMatcher::for_entry(entry)?;
        let resolver = match PathResolver::new(&entry.destination_template, entry.flatten, self.build)
        {
            Ok(resolver) => Some(resolver),
            Err(e) if e.is_connection_level() => return Err(e),
            Err(e) => {
                warn!(template = %entry.destination_template, error = %e, "unusable destination");
                None
            }
        };

        let workspace = self.build.workspace().to_path_buf();
        let mut copied = 0;

        for matched in matcher.matches(&workspace) {
            let Some(resolver) = &resolver else {
                let error = PublishError::InvalidDestination {
                    destination: entry.destination_template.clone(),
                };
                self.failures.push(TransferFailure::new(&matched, None, &error));
                continue;
            };

            let destination = match resolver.resolve(&matched) {
                Ok(destination) => destination,
                Err(e) => {
                    self.record(&matched, None, e)?;
                    continue;
                }
            };

            match self.copy_file(&workspace, &matched, &destination).await {
                Ok(bytes) => {
                    debug!(source = %matched.display(), destination = %destination, bytes, "copied");
                    copied += 1;
                    self.copied += 1;
                }
                Err(e) => self.record(&matched, Some(destination), e)?,
            }
        }

        Ok(copied)
    }

    async fn copy_file(
        &self,
        workspace: &Path,
        matched: &Path,
        destination: &RemotePath,
    ) -> PublishResult<u64> {
        self.sink.ensure_directory(&destination.parent()).await?;

        let local = workspace.join(matched);
        let mut file = tokio::fs::File::open(&local)
            .await
            .map_err(|source| PublishError::LocalIo {
                path: matched.to_path_buf(),
                source,
            })?;

        self.sink.write_file(destination, &mut file).await
    }

    /// Record a per-file failure, or hand a connection-level one back
    fn record(
        &mut self,
        matched: &Path,
        destination: Option<RemotePath>,
        error: PublishError,
    ) -> PublishResult<()> {
        if error.is_connection_level() {
            return Err(error);
        }

        warn!(source = %matched.display(), error = %error, "file not transferred");
        self.failures
            .push(TransferFailure::new(matched, destination, &error));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::BuildStatus;
    use crate::transfer::sink::testing::{RecordingSink, SinkOp};
    use std::fs;
    use tempfile::TempDir;

    fn workspace(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (file, content) in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
        }
        dir
    }

    fn build(ws: &TempDir) -> BuildContext {
        BuildContext::new(BuildStatus::Success, ws.path()).with_variable("BUILD_NUMBER", "42")
    }

    #[tokio::test]
    async fn test_copies_jar_and_checksum() {
        let ws = workspace(&[
            ("build/out.jar", "jar"),
            ("build/out.jar.sha1", "sha"),
            ("build/lib/dep.jar", "dep"),
        ]);
        let build = build(&ws);
        let sink = RecordingSink::new();
        let mut copier = EntryCopier::new(&sink, &build);

        let count = copier
            .copy(&Entry::new("build/*.jar*", "releases/${BUILD_NUMBER}", true))
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert!(copier.failures().is_empty());

        let files = sink.files();
        assert_eq!(files.get("releases/42/out.jar").unwrap(), b"jar");
        assert_eq!(files.get("releases/42/out.jar.sha1").unwrap(), b"sha");
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_directory_ensured_before_each_write() {
        let ws = workspace(&[("a/b/c.txt", "c"), ("a/d.txt", "d")]);
        let build = build(&ws);
        let sink = RecordingSink::new();

        EntryCopier::new(&sink, &build)
            .copy(&Entry::new("a/**", "out", false))
            .await
            .unwrap();

        assert_eq!(
            sink.ops(),
            vec![
                SinkOp::EnsureDirectory("out/a/b".to_string()),
                SinkOp::Write("out/a/b/c.txt".to_string()),
                SinkOp::EnsureDirectory("out/a".to_string()),
                SinkOp::Write("out/a/d.txt".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_pattern_does_no_io() {
        let ws = workspace(&[("a.txt", "a")]);
        let build = build(&ws);
        let sink = RecordingSink::new();

        let count = EntryCopier::new(&sink, &build)
            .copy(&Entry::new("", "out", false))
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert!(sink.ops().is_empty());
    }

    #[tokio::test]
    async fn test_no_matches() {
        let ws = workspace(&[("a.txt", "a")]);
        let build = build(&ws);
        let sink = RecordingSink::new();

        let count = EntryCopier::new(&sink, &build)
            .copy(&Entry::new("*.zip", "out", false))
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert!(sink.ops().is_empty());
    }

    #[tokio::test]
    async fn test_failed_file_does_not_stop_entry() {
        let ws = workspace(&[("1.txt", "1"), ("2.txt", "2"), ("3.txt", "3")]);
        let build = build(&ws);
        let sink = RecordingSink::new();
        sink.fail_write("out/2.txt");
        let mut copier = EntryCopier::new(&sink, &build);

        let count = copier.copy(&Entry::new("*.txt", "out", false)).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(copier.failures().len(), 1);
        let failure = &copier.failures()[0];
        assert_eq!(failure.local_path, PathBuf::from("2.txt"));
        assert_eq!(failure.destination.as_ref().unwrap().as_str(), "out/2.txt");
        assert_eq!(failure.code, "REMOTE_IO");
        assert!(sink.files().contains_key("out/3.txt"));
    }

    #[tokio::test]
    async fn test_connection_loss_propagates() {
        let ws = workspace(&[("1.txt", "1"), ("2.txt", "2"), ("3.txt", "3")]);
        let build = build(&ws);
        let sink = RecordingSink::new();
        sink.drop_connection_on("out/2.txt");
        let mut copier = EntryCopier::new(&sink, &build);

        let err = copier
            .copy(&Entry::new("*.txt", "out", false))
            .await
            .unwrap_err();

        assert!(err.is_connection_level());
        assert!(!sink.files().contains_key("out/3.txt"));
        assert!(copier.failures().is_empty());
    }

    #[tokio::test]
    async fn test_escaping_destination_recorded_per_file() {
        let ws = workspace(&[("1.txt", "1"), ("2.txt", "2")]);
        let build = build(&ws);
        let sink = RecordingSink::new();
        let mut copier = EntryCopier::new(&sink, &build);

        let count = copier.copy(&Entry::new("*.txt", "../up", true)).await.unwrap();

        assert_eq!(count, 0);
        assert_eq!(copier.failures().len(), 2);
        assert!(copier.failures().iter().all(|f| f.code == "INVALID_DESTINATION"));
        assert!(sink.ops().is_empty());
    }

    #[tokio::test]
    async fn test_bracketed_file_name_copied() {
        let ws = workspace(&[("reports/report[1].html", "one"), ("reports/report1.html", "plain")]);
        let build = build(&ws);
        let sink = RecordingSink::new();

        let count = EntryCopier::new(&sink, &build)
            .copy(&Entry::new("reports/report[1].html", "site", true))
            .await
            .unwrap();

        assert_eq!(count, 1);
        let files = sink.files();
        assert_eq!(files.get("site/report[1].html").unwrap(), b"one");
        assert_eq!(files.len(), 1);
    }
}
