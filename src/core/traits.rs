//! Core traits and types shared with the host build pipeline
//!
//! The host supplies a finished build (status, workspace, variables), a
//! console log, and receives a status downgrade when publishing degrades.
//! Publishers plug in through the narrow [`BuildStep`] interface.

use crate::core::variables;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

// ============================================================================
// Build status
// ============================================================================

/// Terminal status of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Success,
    Unstable,
    Failure,
    Aborted,
    NotBuilt,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Success => "success",
            BuildStatus::Unstable => "unstable",
            BuildStatus::Failure => "failure",
            BuildStatus::Aborted => "aborted",
            BuildStatus::NotBuilt => "not_built",
        }
    }

    /// Severity order used when combining statuses; higher is worse
    fn severity(&self) -> u8 {
        match self {
            BuildStatus::Success => 0,
            BuildStatus::Unstable => 1,
            BuildStatus::Failure => 2,
            BuildStatus::NotBuilt => 3,
            BuildStatus::Aborted => 4,
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "success" => Ok(BuildStatus::Success),
            "unstable" => Ok(BuildStatus::Unstable),
            "failure" | "failed" => Ok(BuildStatus::Failure),
            "aborted" => Ok(BuildStatus::Aborted),
            "not_built" | "not-built" => Ok(BuildStatus::NotBuilt),
            other => Err(format!("unknown build status: {}", other)),
        }
    }
}

// ============================================================================
// Build context
// ============================================================================

/// The finished build a publisher runs against
#[derive(Debug, Clone)]
pub struct BuildContext {
    status: BuildStatus,
    workspace: PathBuf,
    variables: HashMap<String, String>,
}

impl BuildContext {
    pub fn new(status: BuildStatus, workspace: impl Into<PathBuf>) -> Self {
        Self {
            status,
            workspace: workspace.into(),
            variables: HashMap::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn status(&self) -> BuildStatus {
        self.status
    }

    pub fn workspace(&self) -> &std::path::Path {
        &self.workspace
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Downgrade the build status; a status is never upgraded
    pub fn set_status(&mut self, status: BuildStatus) {
        if status.severity() > self.status.severity() {
            self.status = status;
        }
    }

    /// Expand `${VAR}` / `$VAR` references against this build's variables
    pub fn expand(&self, template: &str) -> String {
        variables::expand(template, &self.variables)
    }
}

// ============================================================================
// Build log
// ============================================================================

/// Line-oriented console of the build
pub trait BuildLog: Send + Sync {
    fn info(&self, line: &str);
    fn error(&self, line: &str);
}

/// Terminal stream receiving informational build log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsoleStream {
    #[default]
    Stdout,
    Stderr,
}

/// Prints build log lines to the terminal; errors always go to stderr
#[derive(Debug, Default)]
pub struct ConsoleLog {
    info_stream: ConsoleStream,
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps stdout free for machine-readable output
    pub fn stderr() -> Self {
        Self {
            info_stream: ConsoleStream::Stderr,
        }
    }

    pub fn info_stream(&self) -> ConsoleStream {
        self.info_stream
    }
}

impl BuildLog for ConsoleLog {
    fn info(&self, line: &str) {
        match self.info_stream {
            ConsoleStream::Stdout => println!("{}", line),
            ConsoleStream::Stderr => eprintln!("{}", line),
        }
    }

    fn error(&self, line: &str) {
        eprintln!("❌ {}", line);
    }
}

/// Keeps build log lines in memory; errors are prefixed with `ERROR: `
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

impl BuildLog for MemoryLog {
    fn info(&self, line: &str) {
        self.push(line.to_string());
    }

    fn error(&self, line: &str) {
        self.push(format!("ERROR: {}", line));
    }
}

// ============================================================================
// Build step
// ============================================================================

/// A post-build step invoked by the host pipeline
///
/// The host calls [`BuildStep::should_run`] with the build's terminal status
/// and, when it returns true, [`BuildStep::execute`]. The returned boolean is
/// the step-completion signal; publishers always complete.
#[async_trait]
pub trait BuildStep: Send + Sync {
    /// Step name (e.g., "cifs-publisher")
    fn name(&self) -> &str;

    /// Whether the step applies to a build that ended with `status`
    fn should_run(&self, status: BuildStatus) -> bool;

    /// Run the step against a finished build
    async fn execute(&self, build: &mut BuildContext, log: &dyn BuildLog) -> anyhow::Result<bool>;
}
