//! Configuration structures and types for cifs-publisher
//!
//! This module provides type-safe configuration management with serde support.
//! Two documents exist: the global share list (one per build server) and the
//! per-job publisher configuration.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Global configuration: every share a job may publish to
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Registered shares, in registration order
    #[serde(default)]
    pub shares: Vec<ShareDefinition>,
}

/// A remote CIFS share and the credentials used to reach it
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ShareDefinition {
    /// Server host name or address (required)
    pub server: String,

    /// TCP port (default: transport default, 445)
    #[serde(default)]
    pub port: Option<u16>,

    /// Connection timeout in seconds (default: transport default)
    #[serde(default)]
    pub timeout: Option<u64>,

    /// NTLM domain / workgroup
    #[serde(default)]
    pub domain: Option<String>,

    /// User name (anonymous when absent)
    #[serde(default)]
    pub user: Option<String>,

    /// Password, kept out of Debug output and logs
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,

    /// Share name plus optional subdirectory, e.g. `builds/nightly`
    #[serde(default)]
    pub dir: Option<String>,

    /// Local path where the share root is mounted (mounted backend)
    #[serde(default)]
    pub mount_point: Option<PathBuf>,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.map(|v| SecretString::new(v.into())))
}

impl ShareDefinition {
    /// Create a share definition for `server` with no credentials
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: None,
            timeout: None,
            domain: None,
            user: None,
            password: None,
            dir: None,
            mount_point: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn with_dir(mut self, dir: impl Into<String>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn with_credentials(
        mut self,
        domain: Option<&str>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.domain = domain.map(str::to_string);
        self.user = Some(user.into());
        self.password = Some(SecretString::new(password.into().into()));
        self
    }

    pub fn with_mount_point(mut self, mount_point: impl Into<PathBuf>) -> Self {
        self.mount_point = Some(mount_point.into());
        self
    }

    /// Share directory without leading/trailing separators ("" for the server root)
    pub fn share_path(&self) -> String {
        self.dir
            .as_deref()
            .unwrap_or_default()
            .split(['/', '\\'])
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// URL of the server root, `smb://server[:port]/`
    pub fn server_url(&self) -> String {
        match self.port {
            Some(port) => format!("smb://{}:{}/", self.server, port),
            None => format!("smb://{}/", self.server),
        }
    }

    /// Identity of the share inside a registry; never contains credentials
    pub fn display_url(&self) -> String {
        let path = self.share_path();
        if path.is_empty() {
            self.server_url()
        } else {
            format!("{}{}/", self.server_url(), path)
        }
    }

    /// Display URL including `domain;user@`, used for diagnostics
    pub fn authenticated_url(&self) -> String {
        let user = match (&self.domain, &self.user) {
            (Some(domain), Some(user)) => format!("{};{}@", domain, user),
            (None, Some(user)) => format!("{}@", user),
            _ => String::new(),
        };
        let display = self.display_url();
        display.replacen("smb://", &format!("smb://{}", user), 1)
    }

    /// Per-connection timeout, if configured
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

/// Per-job publisher configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PublisherConfig {
    /// Display URL of the target share (default: first registered share)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share: Option<String>,

    /// NetBIOS name server used to resolve the share host for this run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wins_server: Option<String>,

    /// Transfer rules, processed in declared order
    #[serde(default)]
    pub entries: Vec<Entry>,
}

/// One transfer rule: which workspace files go where on the share
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Entry {
    /// ANT-style include pattern relative to the workspace
    #[serde(default)]
    pub source_pattern: String,

    /// Destination directory relative to the share root; may contain `${VARS}`
    #[serde(default)]
    pub destination_template: String,

    /// Drop the source directory structure at the destination
    #[serde(default)]
    pub flatten: bool,

    /// ANT-style exclude patterns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excludes: Option<String>,

    /// Apply the ANT default excludes (VCS metadata, editor backups)
    #[serde(default = "default_true")]
    pub default_excludes: bool,
}

fn default_true() -> bool {
    true
}

impl Entry {
    pub fn new(
        source_pattern: impl Into<String>,
        destination_template: impl Into<String>,
        flatten: bool,
    ) -> Self {
        Self {
            source_pattern: source_pattern.into(),
            destination_template: destination_template.into(),
            flatten,
            excludes: None,
            default_excludes: true,
        }
    }

    pub fn with_excludes(mut self, excludes: impl Into<String>) -> Self {
        self.excludes = Some(excludes.into());
        self
    }

    /// An entry with a blank pattern copies nothing
    pub fn is_noop(&self) -> bool {
        self.source_pattern.trim().is_empty()
    }
}
