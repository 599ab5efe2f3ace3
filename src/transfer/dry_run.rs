//! Dry-run backend: records what a publish would do without touching a share

use crate::core::config::ShareDefinition;
use crate::core::error::{PublishError, PublishResult};
use crate::transfer::path_resolver::RemotePath;
use crate::transfer::sink::{ConnectOptions, RemoteFileSink, ShareConnector, SourceStream};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

/// One planned remote operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlannedOperation {
    CreateDirectory { path: RemotePath },
    WriteFile { path: RemotePath, bytes: u64 },
}

#[derive(Debug, Default)]
struct Plan {
    operations: Vec<PlannedOperation>,
    dirs: BTreeSet<RemotePath>,
    files: BTreeSet<RemotePath>,
}

/// Connector whose sinks only record operations
#[derive(Debug, Default, Clone)]
pub struct DryRunConnector {
    plan: Arc<Mutex<Plan>>,
}

impl DryRunConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations recorded so far, in execution order
    pub fn operations(&self) -> Vec<PlannedOperation> {
        self.plan
            .lock()
            .map(|plan| plan.operations.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ShareConnector for DryRunConnector {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn connect(
        &self,
        share: &ShareDefinition,
        _options: &ConnectOptions,
    ) -> PublishResult<Box<dyn RemoteFileSink>> {
        Ok(Box::new(DryRunSink {
            server: share.server.clone(),
            plan: Arc::clone(&self.plan),
        }))
    }
}

struct DryRunSink {
    server: String,
    plan: Arc<Mutex<Plan>>,
}

impl DryRunSink {
    fn with_plan<T>(&self, f: impl FnOnce(&mut Plan) -> T) -> PublishResult<T> {
        let mut plan = self.plan.lock().map_err(|_| PublishError::Connection {
            server: self.server.clone(),
            message: "dry-run plan is poisoned".to_string(),
        })?;
        Ok(f(&mut plan))
    }
}

#[async_trait]
impl RemoteFileSink for DryRunSink {
    fn target(&self) -> String {
        format!("{} (dry run)", self.server)
    }

    async fn ensure_directory(&self, path: &RemotePath) -> PublishResult<()> {
        self.with_plan(|plan| {
            if !path.is_root() && plan.dirs.insert(path.clone()) {
                plan.operations.push(PlannedOperation::CreateDirectory { path: path.clone() });
            }
        })
    }

    async fn exists(&self, path: &RemotePath) -> PublishResult<bool> {
        self.with_plan(|plan| path.is_root() || plan.dirs.contains(path) || plan.files.contains(path))
    }

    async fn is_file(&self, path: &RemotePath) -> PublishResult<bool> {
        self.with_plan(|plan| plan.files.contains(path))
    }

    async fn write_file(&self, path: &RemotePath, source: SourceStream<'_>) -> PublishResult<u64> {
        let bytes = tokio::io::copy(source, &mut tokio::io::sink())
            .await
            .map_err(|e| PublishError::remote(path.to_string(), e))?;

        self.with_plan(|plan| {
            plan.files.insert(path.clone());
            plan.operations.push(PlannedOperation::WriteFile {
                path: path.clone(),
                bytes,
            });
            bytes
        })
    }
}
