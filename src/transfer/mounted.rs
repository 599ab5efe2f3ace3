//! Mounted-share backend
//!
//! Writes through a share the operating system already has mounted: the
//! share's `mountPoint`, or on Windows the UNC path `\\server\dir`. The
//! share timeout bounds every filesystem operation.

use crate::core::config::ShareDefinition;
use crate::core::error::{PublishError, PublishResult};
use crate::transfer::path_resolver::RemotePath;
use crate::transfer::sink::{ConnectOptions, RemoteFileSink, ShareConnector, SourceStream};
use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Connects to shares through their local mount
#[derive(Debug, Default, Clone)]
pub struct MountedShareConnector;

impl MountedShareConnector {
    pub fn new() -> Self {
        Self
    }
}

fn share_root(share: &ShareDefinition, authenticated: bool) -> PublishResult<PathBuf> {
    if let Some(mount_point) = &share.mount_point {
        return Ok(mount_point.clone());
    }

    if cfg!(windows) {
        let mut unc = format!(r"\\{}", share.server);
        if authenticated {
            for segment in share.share_path().split('/').filter(|s| !s.is_empty()) {
                unc.push('\\');
                unc.push_str(segment);
            }
        }
        return Ok(PathBuf::from(unc));
    }

    Err(PublishError::ConfigError(format!(
        "share {} has no mountPoint; mount it locally or use the smb backend",
        share.display_url()
    )))
}

#[async_trait]
impl ShareConnector for MountedShareConnector {
    fn name(&self) -> &str {
        "mounted"
    }

    async fn connect(
        &self,
        share: &ShareDefinition,
        options: &ConnectOptions,
    ) -> PublishResult<Box<dyn RemoteFileSink>> {
        let root = share_root(share, options.authenticated)?;

        if let Some(wins) = &options.wins_server {
            debug!(wins_server = %wins, "name resolution is left to the OS mount");
        }

        let sink = MountedShareSink {
            server: share.server.clone(),
            root,
            timeout: share.timeout_duration(),
        };

        if options.authenticated {
            sink.require_root().await?;
        }

        debug!(root = %sink.root.display(), "using mounted share");
        Ok(Box::new(sink))
    }
}

/// Sink rooted at a local mount of the share
#[derive(Debug, Clone)]
pub struct MountedShareSink {
    server: String,
    root: PathBuf,
    timeout: Option<Duration>,
}

impl MountedShareSink {
    pub fn new(server: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            server: server.into(),
            root: root.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn local_path(&self, path: &RemotePath) -> PathBuf {
        path.segments()
            .fold(self.root.clone(), |local, segment| local.join(segment))
    }

    /// An unmounted share must not turn into writes on the local disk
    async fn require_root(&self) -> PublishResult<()> {
        let root = self.root.clone();
        let exists = self
            .bounded(&RemotePath::root(), async move { fs::try_exists(&root).await })
            .await?;

        if exists {
            Ok(())
        } else {
            Err(PublishError::Connection {
                server: self.server.clone(),
                message: format!("share root {} is not mounted", self.root.display()),
            })
        }
    }

    async fn bounded<T, F>(&self, path: &RemotePath, op: F) -> PublishResult<T>
    where
        F: Future<Output = io::Result<T>> + Send,
    {
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, op)
                .await
                .map_err(|_| PublishError::Timeout {
                    path: path.to_string(),
                    seconds: limit.as_secs(),
                })?,
            None => op.await,
        };

        result.map_err(|e| PublishError::remote(path.to_string(), e))
    }
}

#[async_trait]
impl RemoteFileSink for MountedShareSink {
    fn target(&self) -> String {
        self.server.clone()
    }

    async fn ensure_directory(&self, path: &RemotePath) -> PublishResult<()> {
        self.require_root().await?;
        let local = self.local_path(path);
        self.bounded(path, async move { fs::create_dir_all(&local).await })
            .await
    }

    async fn exists(&self, path: &RemotePath) -> PublishResult<bool> {
        let local = self.local_path(path);
        self.bounded(path, async move { fs::try_exists(&local).await })
            .await
    }

    async fn is_file(&self, path: &RemotePath) -> PublishResult<bool> {
        let local = self.local_path(path);
        self.bounded(path, async move {
            match fs::metadata(&local).await {
                Ok(metadata) => Ok(metadata.is_file()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn write_file(&self, path: &RemotePath, source: SourceStream<'_>) -> PublishResult<u64> {
        let local = self.local_path(path);
        self.bounded(path, async move {
            let mut file = fs::File::create(&local).await?;
            let written = tokio::io::copy(source, &mut file).await?;
            file.flush().await?;
            Ok(written)
        })
        .await
    }
}
