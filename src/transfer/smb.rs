//! Native SMB backend built on `remotefs-smb` (cargo feature `smb`)
//!
//! The client library is blocking, so every call runs on the blocking pool
//! behind a mutex; operations are still issued one at a time. Uploads are
//! fed to the client through a bounded chunk channel.

use crate::core::config::ShareDefinition;
use crate::core::error::{PublishError, PublishResult};
use crate::transfer::chunk_reader::{self, CHUNK_CAPACITY};
use crate::transfer::path_resolver::RemotePath;
use crate::transfer::sink::{ConnectOptions, RemoteFileSink, ShareConnector, SourceStream};
use async_trait::async_trait;
use remotefs::fs::{Metadata, UnixPex};
use remotefs::{RemoteErrorType, RemoteFs};
use remotefs_smb::{SmbCredentials, SmbFs, SmbOptions};
use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Connects with the share's credentials over SMB2/3
#[derive(Debug, Default, Clone)]
pub struct SmbConnector;

impl SmbConnector {
    pub fn new() -> Self {
        Self
    }
}

/// Split `dir` into the share name and the subdirectory below it
fn split_share(share: &ShareDefinition) -> (String, Vec<String>) {
    let path = share.share_path();
    let mut segments = path.split('/').filter(|s| !s.is_empty()).map(str::to_string);
    let name = segments.next().unwrap_or_default();
    (name, segments.collect())
}

#[async_trait]
impl ShareConnector for SmbConnector {
    fn name(&self) -> &str {
        "smb"
    }

    async fn connect(
        &self,
        share: &ShareDefinition,
        options: &ConnectOptions,
    ) -> PublishResult<Box<dyn RemoteFileSink>> {
        if let Some(wins) = &options.wins_server {
            warn!(wins_server = %wins, "WINS name resolution is not supported by the smb backend; using DNS");
        }

        let server_url = match share.port {
            Some(port) => format!("smb://{}:{}", share.server, port),
            None => format!("smb://{}", share.server),
        };
        let (share_name, prefix) = split_share(share);

        let mut credentials = SmbCredentials::default()
            .server(server_url)
            .share(format!("/{}", share_name));
        if options.authenticated {
            if let Some(user) = &share.user {
                credentials = credentials.username(user);
            }
            if let Some(password) = &share.password {
                credentials = credentials.password(password.expose_secret());
            }
            if let Some(domain) = &share.domain {
                credentials = credentials.workgroup(domain);
            }
        }

        let server = share.server.clone();
        let timeout = share.timeout_duration();
        let connect_server = server.clone();
        let task = tokio::task::spawn_blocking(move || {
            let mut client = SmbFs::try_new(credentials, SmbOptions::default()).map_err(|e| {
                PublishError::Connection {
                    server: connect_server.clone(),
                    message: e.to_string(),
                }
            })?;
            client.connect().map_err(|e| PublishError::Connection {
                server: connect_server,
                message: e.to_string(),
            })?;
            Ok::<_, PublishError>(client)
        });

        let client = join(&server, &RemotePath::root(), timeout, task).await?;
        debug!(server = %server, share = %share_name, "smb session established");

        Ok(Box::new(SmbSink {
            server,
            prefix: if options.authenticated { prefix } else { Vec::new() },
            timeout,
            client: Arc::new(Mutex::new(client)),
        }))
    }
}

async fn join<T>(
    server: &str,
    path: &RemotePath,
    timeout: Option<Duration>,
    task: tokio::task::JoinHandle<PublishResult<T>>,
) -> PublishResult<T> {
    let joined = match timeout {
        Some(limit) => tokio::time::timeout(limit, task)
            .await
            .map_err(|_| PublishError::Timeout {
                path: path.to_string(),
                seconds: limit.as_secs(),
            })?,
        None => task.await,
    };

    joined.map_err(|e| PublishError::Connection {
        server: server.to_string(),
        message: e.to_string(),
    })?
}

struct SmbSink {
    server: String,
    prefix: Vec<String>,
    timeout: Option<Duration>,
    client: Arc<Mutex<SmbFs>>,
}

impl SmbSink {
    fn remote_path(&self, path: &RemotePath) -> PathBuf {
        let mut remote = PathBuf::from("/");
        for segment in self.prefix.iter().map(String::as_str).chain(path.segments()) {
            remote.push(segment);
        }
        remote
    }

    async fn run<T, F>(&self, path: &RemotePath, op: F) -> PublishResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SmbFs, PathBuf) -> PublishResult<T> + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        let server = self.server.clone();
        let remote = self.remote_path(path);
        let task = tokio::task::spawn_blocking(move || {
            let mut client = client.lock().map_err(|_| PublishError::Connection {
                server,
                message: "smb session is poisoned".to_string(),
            })?;
            op(&mut client, remote)
        });
        join(&self.server, path, self.timeout, task).await
    }
}

#[async_trait]
impl RemoteFileSink for SmbSink {
    fn target(&self) -> String {
        self.server.clone()
    }

    async fn ensure_directory(&self, path: &RemotePath) -> PublishResult<()> {
        let display = path.to_string();
        self.run(path, move |client, remote| {
            let mut current = PathBuf::from("/");
            for component in remote.iter().skip(1) {
                current.push(component);
                match client.create_dir(&current, UnixPex::from(0o755)) {
                    Ok(()) => {}
                    Err(e) if e.kind == RemoteErrorType::DirectoryAlreadyExists => {}
                    Err(e) => return Err(PublishError::remote(display, e)),
                }
            }
            Ok(())
        })
        .await
    }

    async fn exists(&self, path: &RemotePath) -> PublishResult<bool> {
        let display = path.to_string();
        self.run(path, move |client, remote| {
            client
                .exists(&remote)
                .map_err(|e| PublishError::remote(display, e))
        })
        .await
    }

    async fn is_file(&self, path: &RemotePath) -> PublishResult<bool> {
        self.run(path, move |client, remote| match client.stat(&remote) {
            Ok(file) => Ok(file.is_file()),
            Err(_) => Ok(false),
        })
        .await
    }

    async fn write_file(&self, path: &RemotePath, source: SourceStream<'_>) -> PublishResult<u64> {
        let display = path.to_string();
        let (tx, reader) = chunk_reader::channel(CHUNK_CAPACITY);

        // Size is unknown up front; the client copies until the reader hits EOF
        let upload = self.run(path, move |client, remote| {
            client
                .create_file(&remote, &Metadata::default(), Box::new(reader))
                .map_err(|e| PublishError::remote(display, e))
        });

        tokio::pin!(upload);

        // An upload that fails or times out stops feeding the source
        tokio::select! {
            written = &mut upload => return written,
            _ = chunk_reader::pump(source, tx) => {}
        }
        upload.await
    }
}
