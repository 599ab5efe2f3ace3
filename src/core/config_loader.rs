//! Configuration file loader for cifs-publisher
//!
//! This module provides configuration loading, environment expansion,
//! overrides and validation for the global share list and the job config.

use super::config::*;
use crate::core::error::PublishError;
use lazy_static::lazy_static;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Global share list file name (looked up in $HOME)
const GLOBAL_CONFIG_FILENAME: &str = ".cifs-shares.yaml";

/// Job configuration file name (looked up in the workspace)
const JOB_CONFIG_FILENAME: &str = ".cifs-publish.yaml";

lazy_static! {
    /// Environment variable pattern (${VAR_NAME})
    static ref ENV_VAR_PATTERN: Regex =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env pattern is valid");
}

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Explicit global share list (default: ~/.cifs-shares.yaml)
    pub global_path: Option<PathBuf>,

    /// Explicit job configuration (default: <workspace>/.cifs-publish.yaml)
    pub job_path: Option<PathBuf>,

    /// Build workspace
    pub workspace: PathBuf,

    /// Environment variables
    pub env: HashMap<String, String>,
}

/// Both configuration documents, ready for a publish run
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub global: GlobalConfig,
    pub job: PublisherConfig,
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "shares[0].server")
    pub field: String,

    /// Error message
    pub message: String,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the global share list and the job configuration
    ///
    /// Explicit paths must exist; default locations are optional.
    /// Job settings can be overridden with `CIFS_SHARE` and `CIFS_WINS_SERVER`.
    pub async fn load(options: ConfigLoadOptions) -> Result<LoadedConfig, PublishError> {
        let global: GlobalConfig = match &options.global_path {
            Some(path) => Self::load_required(path).await?,
            None => match Self::default_global_path(&options.env) {
                Some(path) => Self::load_optional(&path).await?.unwrap_or_default(),
                None => GlobalConfig::default(),
            },
        };

        let job: PublisherConfig = match &options.job_path {
            Some(path) => Self::load_required(path).await?,
            None => Self::load_optional(&options.workspace.join(JOB_CONFIG_FILENAME))
                .await?
                .unwrap_or_default(),
        };

        let global = Self::expand_env_vars(global, &options.env);
        let job = Self::apply_env_overrides(job, &options.env);

        Ok(LoadedConfig { global, job })
    }

    /// Snapshot of the process environment for [`ConfigLoadOptions::env`]
    pub fn process_env() -> HashMap<String, String> {
        env::vars().collect()
    }

    fn default_global_path(env: &HashMap<String, String>) -> Option<PathBuf> {
        env.get("HOME")
            .or_else(|| env.get("USERPROFILE"))
            .map(|home| PathBuf::from(home).join(GLOBAL_CONFIG_FILENAME))
    }

    async fn load_required<T>(path: &Path) -> Result<T, PublishError>
    where
        T: serde::de::DeserializeOwned,
    {
        Self::load_optional(path).await?.ok_or_else(|| {
            PublishError::ConfigError(format!("config file not found: {}", path.display()))
        })
    }

    async fn load_optional<T>(path: &Path) -> Result<Option<T>, PublishError>
    where
        T: serde::de::DeserializeOwned,
    {
        if fs::metadata(path).await.is_err() {
            debug!(path = %path.display(), "config file not present");
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            PublishError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse(path, &content).map(Some)
    }

    /// Parse a document as TOML (`.toml`) or YAML (anything else)
    pub fn parse<T>(path: &Path, content: &str) -> Result<T, PublishError>
    where
        T: serde::de::DeserializeOwned,
    {
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            toml::from_str(content).map_err(|e| {
                PublishError::ConfigError(format!(
                    "Failed to parse TOML config {}: {}",
                    path.display(),
                    e
                ))
            })
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                PublishError::ConfigError(format!(
                    "Failed to parse YAML config {}: {}",
                    path.display(),
                    e
                ))
            })
        }
    }

    /// Apply `CIFS_SHARE` / `CIFS_WINS_SERVER` to the job configuration
    fn apply_env_overrides(mut job: PublisherConfig, env: &HashMap<String, String>) -> PublisherConfig {
        if let Some(share) = env.get("CIFS_SHARE").filter(|s| !s.is_empty()) {
            job.share = Some(share.clone());
        }

        if let Some(wins) = env.get("CIFS_WINS_SERVER").filter(|s| !s.is_empty()) {
            job.wins_server = Some(wins.clone());
        }

        job
    }

    /// Expand `${VAR}` references in share connection settings
    fn expand_env_vars(mut global: GlobalConfig, env: &HashMap<String, String>) -> GlobalConfig {
        for share in &mut global.shares {
            share.server = Self::expand_string(&share.server, env);

            if let Some(domain) = &share.domain {
                share.domain = Some(Self::expand_string(domain, env));
            }
            if let Some(user) = &share.user {
                share.user = Some(Self::expand_string(user, env));
            }
            if let Some(password) = &share.password {
                let expanded = Self::expand_string(password.expose_secret(), env);
                share.password = Some(SecretString::new(expanded.into()));
            }
        }

        global
    }

    /// Expand environment variables in a single string
    fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        let mut result = input.to_string();
        for cap in ENV_VAR_PATTERN.captures_iter(input) {
            let var_name = &cap[1];

            if let Some(value) = env.get(var_name) {
                result = result.replace(&format!("${{{}}}", var_name), value);
            } else {
                warn!(variable = var_name, "environment variable not found");
            }
        }

        result
    }

    /// Validate both configuration documents
    pub fn validate(config: &LoadedConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        Self::validate_shares(&config.global, &mut errors, &mut warnings);
        Self::validate_job(config, &mut errors, &mut warnings);

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    fn validate_shares(
        global: &GlobalConfig,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        let mut seen = HashSet::new();

        for (i, share) in global.shares.iter().enumerate() {
            if share.server.trim().is_empty() {
                errors.push(ConfigValidationError {
                    field: format!("shares[{}].server", i),
                    message: "server is required".to_string(),
                });
            }

            if share.port == Some(0) {
                errors.push(ConfigValidationError {
                    field: format!("shares[{}].port", i),
                    message: "port must be between 1 and 65535".to_string(),
                });
            }

            if share.timeout == Some(0) {
                errors.push(ConfigValidationError {
                    field: format!("shares[{}].timeout", i),
                    message: "timeout must be at least one second".to_string(),
                });
            }

            if !seen.insert(share.display_url()) {
                errors.push(ConfigValidationError {
                    field: format!("shares[{}]", i),
                    message: format!("duplicate share {}", share.display_url()),
                });
            }

            if share.password.is_some() && share.user.is_none() {
                warnings.push(ConfigValidationWarning {
                    field: format!("shares[{}].password", i),
                    message: "password is ignored without a user".to_string(),
                    suggestion: Some("Add `user` or remove `password`".to_string()),
                });
            }
        }
    }

    fn validate_job(
        config: &LoadedConfig,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        let job = &config.job;

        if let Some(reference) = &job.share
            && !config
                .global
                .shares
                .iter()
                .any(|s| &s.display_url() == reference)
        {
            warnings.push(ConfigValidationWarning {
                field: "share".to_string(),
                message: format!("share {} is not registered", reference),
                suggestion: Some("Run `cifs-publish shares` to list registered shares".to_string()),
            });
        }

        if job.share.is_none() && config.global.shares.is_empty() {
            warnings.push(ConfigValidationWarning {
                field: "share".to_string(),
                message: "no share registered; nothing will be published".to_string(),
                suggestion: None,
            });
        }

        if let Some(wins) = &job.wins_server {
            warnings.push(ConfigValidationWarning {
                field: "winsServer".to_string(),
                message: format!(
                    "WINS server {} is not used for name resolution by the mounted or smb backends",
                    wins
                ),
                suggestion: Some(
                    "Use a share server name the build agent resolves through the OS or DNS"
                        .to_string(),
                ),
            });
        }

        for (i, entry) in job.entries.iter().enumerate() {
            if entry.is_noop() {
                warnings.push(ConfigValidationWarning {
                    field: format!("entries[{}].sourcePattern", i),
                    message: "empty pattern; this entry copies nothing".to_string(),
                    suggestion: Some("Use `**` to publish the whole workspace".to_string()),
                });
            }

            if entry
                .destination_template
                .split(['/', '\\'])
                .any(|segment| segment == "..")
            {
                errors.push(ConfigValidationError {
                    field: format!("entries[{}].destinationTemplate", i),
                    message: "destination must stay inside the share".to_string(),
                });
            }
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(workspace: &Path) -> ConfigLoadOptions {
        ConfigLoadOptions {
            workspace: workspace.to_path_buf(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_load_yaml_and_toml() {
        let dir = TempDir::new().unwrap();
        let global_path = dir.path().join("shares.toml");
        std::fs::write(
            &global_path,
            r#"
[[shares]]
server = "nas"
dir = "builds"
user = "ci"
password = "${NAS_PASSWORD}"
"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join(".cifs-publish.yaml"),
            "entries:\n  - sourcePattern: '**/*.jar'\n    destinationTemplate: out\n",
        )
        .unwrap();

        let mut opts = options(dir.path());
        opts.global_path = Some(global_path);
        opts.env
            .insert("NAS_PASSWORD".to_string(), "from-env".to_string());

        let loaded = ConfigLoader::load(opts).await.unwrap();

        assert_eq!(loaded.global.shares.len(), 1);
        assert_eq!(
            loaded.global.shares[0]
                .password
                .as_ref()
                .unwrap()
                .expose_secret(),
            "from-env"
        );
        assert_eq!(loaded.job.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_default_files_are_empty() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(dir.path());
        opts.env
            .insert("HOME".to_string(), dir.path().display().to_string());

        let loaded = ConfigLoader::load(opts).await.unwrap();

        assert!(loaded.global.shares.is_empty());
        assert!(loaded.job.entries.is_empty());
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_error() {
        let dir = TempDir::new().unwrap();
        let mut opts = options(dir.path());
        opts.job_path = Some(dir.path().join("nope.yaml"));

        let err = ConfigLoader::load(opts).await.unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_env_overrides() {
        let mut env = HashMap::new();
        env.insert("CIFS_SHARE".to_string(), "smb://nas/releases/".to_string());
        env.insert("CIFS_WINS_SERVER".to_string(), "10.1.1.1".to_string());

        let job = ConfigLoader::apply_env_overrides(PublisherConfig::default(), &env);

        assert_eq!(job.share.as_deref(), Some("smb://nas/releases/"));
        assert_eq!(job.wins_server.as_deref(), Some("10.1.1.1"));
    }

    #[test]
    fn test_expand_string() {
        let mut env = HashMap::new();
        env.insert("NAS_USER".to_string(), "builder".to_string());

        assert_eq!(ConfigLoader::expand_string("${NAS_USER}", &env), "builder");
        assert_eq!(ConfigLoader::expand_string("${UNSET}", &env), "${UNSET}");
    }

    #[test]
    fn test_parse_error_mentions_path() {
        let err = ConfigLoader::parse::<GlobalConfig>(Path::new("bad.yaml"), "shares: [")
            .unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_validate_reports_errors_and_warnings() {
        let mut share = ShareDefinition::new("");
        share.port = Some(0);
        share.password = Some(SecretString::new("x".into()));

        let config = LoadedConfig {
            global: GlobalConfig {
                shares: vec![share, ShareDefinition::new("nas"), ShareDefinition::new("nas")],
            },
            job: PublisherConfig {
                share: Some("smb://elsewhere/".to_string()),
                wins_server: None,
                entries: vec![
                    Entry::new("", "out", false),
                    Entry::new("**", "../escape", false),
                ],
            },
        };

        let result = ConfigLoader::validate(&config);

        assert!(!result.valid);
        let fields: Vec<_> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"shares[0].server"));
        assert!(fields.contains(&"shares[0].port"));
        assert!(fields.contains(&"shares[2]"));
        assert!(fields.contains(&"entries[1].destinationTemplate"));

        let warnings: Vec<_> = result.warnings.iter().map(|w| w.field.as_str()).collect();
        assert!(warnings.contains(&"shares[0].password"));
        assert!(warnings.contains(&"share"));
        assert!(warnings.contains(&"entries[0].sourcePattern"));
    }

    #[test]
    fn test_validate_warns_about_wins_server() {
        let config = LoadedConfig {
            global: GlobalConfig {
                shares: vec![ShareDefinition::new("nas")],
            },
            job: PublisherConfig {
                share: None,
                wins_server: Some("10.0.0.5".to_string()),
                entries: vec![Entry::new("**", "out", false)],
            },
        };

        let result = ConfigLoader::validate(&config);

        assert!(result.valid);
        let wins = result
            .warnings
            .iter()
            .find(|w| w.field == "winsServer")
            .unwrap();
        assert!(wins.message.contains("10.0.0.5"));

        let mut without = config.clone();
        without.job.wins_server = None;
        let result = ConfigLoader::validate(&without);
        assert!(result.warnings.iter().all(|w| w.field != "winsServer"));
    }

    #[test]
    fn test_format_validation_result() {
        let result = ConfigValidationResult {
            valid: false,
            errors: vec![ConfigValidationError {
                field: "shares[0].server".to_string(),
                message: "server is required".to_string(),
            }],
            warnings: vec![ConfigValidationWarning {
                field: "entries[0].sourcePattern".to_string(),
                message: "empty pattern".to_string(),
                suggestion: Some("Use `**`".to_string()),
            }],
        };

        let formatted = ConfigLoader::format_validation_result(&result);

        assert!(formatted.contains("❌ Configuration has errors"));
        assert!(formatted.contains("[shares[0].server]"));
        assert!(formatted.contains("🟡 Warnings:"));
        assert!(formatted.contains("Suggestion: Use `**`"));
    }
}
