//! Remote file sink - the capability the transfer engine needs from a share
//!
//! A sink is bound to one resolved share. Backends implement
//! [`RemoteFileSink`]; a [`ShareConnector`] builds a sink for a share with
//! credentials and name-resolution settings applied once per run.

use crate::core::config::ShareDefinition;
use crate::core::error::PublishResult;
use crate::transfer::path_resolver::RemotePath;
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Byte stream handed to [`RemoteFileSink::write_file`]
pub type SourceStream<'a> = &'a mut (dyn AsyncRead + Send + Unpin);

/// Operations on the share, relative to its root
#[async_trait]
pub trait RemoteFileSink: Send + Sync {
    /// Human readable target, e.g. the server name
    fn target(&self) -> String;

    /// Create every missing segment of `path`; succeeds if it already exists
    async fn ensure_directory(&self, path: &RemotePath) -> PublishResult<()>;

    async fn exists(&self, path: &RemotePath) -> PublishResult<bool>;

    async fn is_file(&self, path: &RemotePath) -> PublishResult<bool>;

    /// Create or overwrite `path` with the contents of `source`.
    ///
    /// A failed write may leave a truncated file behind.
    async fn write_file(&self, path: &RemotePath, source: SourceStream<'_>) -> PublishResult<u64>;
}

/// Per-run connection settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// NetBIOS name server used for this connection only
    pub wins_server: Option<String>,

    /// Connect with the share's credentials (false: anonymous, server root)
    pub authenticated: bool,
}

impl ConnectOptions {
    /// Authenticated connection, optionally through a WINS server
    pub fn authenticated(wins_server: Option<String>) -> Self {
        Self {
            wins_server: wins_server.filter(|w| !w.trim().is_empty()),
            authenticated: true,
        }
    }

    /// Anonymous connection to the server root
    pub fn anonymous() -> Self {
        Self {
            wins_server: None,
            authenticated: false,
        }
    }
}

/// Opens sinks for shares
#[async_trait]
pub trait ShareConnector: Send + Sync {
    /// Backend name (e.g., "mounted", "smb")
    fn name(&self) -> &str;

    async fn connect(
        &self,
        share: &ShareDefinition,
        options: &ConnectOptions,
    ) -> PublishResult<Box<dyn RemoteFileSink>>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording sink with failure injection for engine tests

    use super::*;
    use crate::core::error::PublishError;
    use std::collections::{BTreeMap, BTreeSet, HashSet};
    use std::sync::{Arc, Mutex};
    use tokio::io::AsyncReadExt;

    /// Every operation performed against a [`RecordingSink`]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SinkOp {
        EnsureDirectory(String),
        Write(String),
    }

    #[derive(Debug, Default)]
    pub struct SinkState {
        pub ops: Vec<SinkOp>,
        pub dirs: BTreeSet<String>,
        pub files: BTreeMap<String, Vec<u8>>,
        pub failing_writes: HashSet<String>,
        pub connection_failure_on: Option<String>,
    }

    /// In-memory share shared between the test and the sink it hands out
    #[derive(Debug, Clone, Default)]
    pub struct RecordingSink {
        pub state: Arc<Mutex<SinkState>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_write(&self, path: &str) {
            self.state.lock().unwrap().failing_writes.insert(path.to_string());
        }

        pub fn drop_connection_on(&self, path: &str) {
            self.state.lock().unwrap().connection_failure_on = Some(path.to_string());
        }

        pub fn ops(&self) -> Vec<SinkOp> {
            self.state.lock().unwrap().ops.clone()
        }

        pub fn files(&self) -> BTreeMap<String, Vec<u8>> {
            self.state.lock().unwrap().files.clone()
        }
    }

    #[async_trait]
    impl RemoteFileSink for RecordingSink {
        fn target(&self) -> String {
            "memory".to_string()
        }

        async fn ensure_directory(&self, path: &RemotePath) -> PublishResult<()> {
            let mut state = self.state.lock().unwrap();
            state.ops.push(SinkOp::EnsureDirectory(path.to_string()));
            let mut current = RemotePath::root();
            for segment in path.segments() {
                current = current.join(&RemotePath::parse(segment)?);
                state.dirs.insert(current.to_string());
            }
            Ok(())
        }

        async fn exists(&self, path: &RemotePath) -> PublishResult<bool> {
            let state = self.state.lock().unwrap();
            let key = path.to_string();
            Ok(path.is_root() || state.dirs.contains(&key) || state.files.contains_key(&key))
        }

        async fn is_file(&self, path: &RemotePath) -> PublishResult<bool> {
            Ok(self.state.lock().unwrap().files.contains_key(&path.to_string()))
        }

        async fn write_file(
            &self,
            path: &RemotePath,
            source: SourceStream<'_>,
        ) -> PublishResult<u64> {
            let key = path.to_string();
            {
                let mut state = self.state.lock().unwrap();
                state.ops.push(SinkOp::Write(key.clone()));
                if state.connection_failure_on.as_deref() == Some(key.as_str()) {
                    return Err(PublishError::Connection {
                        server: "memory".to_string(),
                        message: "connection reset by peer".to_string(),
                    });
                }
                if state.failing_writes.contains(&key) {
                    return Err(PublishError::remote(key, "access denied"));
                }
            }

            let mut buffer = Vec::new();
            source
                .read_to_end(&mut buffer)
                .await
                .map_err(|e| PublishError::remote(key.clone(), e))?;
            let written = buffer.len() as u64;
            self.state.lock().unwrap().files.insert(key, buffer);
            Ok(written)
        }
    }

    /// Connector handing out clones of one [`RecordingSink`]
    #[derive(Debug, Default)]
    pub struct RecordingConnector {
        pub sink: RecordingSink,
        pub connections: Mutex<Vec<(String, ConnectOptions)>>,
        pub refuse: bool,
    }

    impl RecordingConnector {
        pub fn connections(&self) -> Vec<(String, ConnectOptions)> {
            self.connections.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ShareConnector for RecordingConnector {
        fn name(&self) -> &str {
            "recording"
        }

        async fn connect(
            &self,
            share: &ShareDefinition,
            options: &ConnectOptions,
        ) -> PublishResult<Box<dyn RemoteFileSink>> {
            self.connections
                .lock()
                .unwrap()
                .push((share.display_url(), options.clone()));
            if self.refuse {
                return Err(PublishError::Connection {
                    server: share.server.clone(),
                    message: "no route to host".to_string(),
                });
            }
            Ok(Box::new(self.sink.clone()))
        }
    }
}
