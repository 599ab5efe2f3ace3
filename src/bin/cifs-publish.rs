//! cifs-publish CLI
//!
//! Publishes build artifacts to a registered CIFS/SMB share

use anyhow::{Context, Result, bail};
use cifs_publisher::core::config_loader::{ConfigLoadOptions, ConfigLoader, LoadedConfig};
use cifs_publisher::orchestration::check_share;
use cifs_publisher::transfer::{DryRunConnector, MountedShareConnector, ShareConnector};
use cifs_publisher::{
    BuildContext, BuildStatus, ConsoleLog, PublishCoordinator, PublishReport, PublishStatus,
    ShareRegistry,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Publish build artifacts to a CIFS/SMB share
#[derive(Parser)]
#[command(name = "cifs-publish")]
#[command(version = "0.1.0")]
#[command(about = "Publish build artifacts to a CIFS/SMB share", long_about = None)]
struct Cli {
    /// Global share list (default: ~/.cifs-shares.yaml)
    #[arg(long, global = true, value_name = "FILE")]
    shares_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy the configured entries of a finished build to its share
    #[command(after_help = "Note: a job's winsServer setting is not used for name resolution; \
the mounted backend relies on the OS mount and the smb backend on DNS.")]
    Publish {
        /// Build workspace (defaults to current directory)
        #[arg(value_name = "WORKSPACE")]
        workspace: Option<PathBuf>,

        /// Job configuration (default: <WORKSPACE>/.cifs-publish.yaml)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Terminal status of the build
        #[arg(long, default_value = "success")]
        status: BuildStatus,

        /// Build number, available as ${BUILD_NUMBER}
        #[arg(long, env = "BUILD_NUMBER")]
        build_number: Option<String>,

        /// Job name, available as ${JOB_NAME}
        #[arg(long, env = "JOB_NAME")]
        job_name: Option<String>,

        /// Extra build variable (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// Transport backend
        #[arg(long, value_enum, default_value_t = Backend::Mounted)]
        backend: Backend,

        /// Shorthand for --backend dry-run
        #[arg(long)]
        dry_run: bool,

        /// Print the publish report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that a registered share is reachable and usable
    Check {
        /// Display URL of the share (default: first registered share)
        #[arg(value_name = "SHARE")]
        share: Option<String>,

        /// Transport backend
        #[arg(long, value_enum, default_value_t = Backend::Mounted)]
        backend: Backend,
    },

    /// List registered shares
    Shares,

    /// Validate the share list and a job configuration
    Validate {
        /// Build workspace (defaults to current directory)
        #[arg(value_name = "WORKSPACE")]
        workspace: Option<PathBuf>,

        /// Job configuration (default: <WORKSPACE>/.cifs-publish.yaml)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Share mounted by the operating system
    Mounted,
    /// Record operations without writing
    DryRun,
    /// Native SMB client (requires the `smb` feature)
    Smb,
}

fn parse_var(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

fn connector(backend: Backend) -> Result<Arc<dyn ShareConnector>> {
    match backend {
        Backend::Mounted => Ok(Arc::new(MountedShareConnector::new())),
        Backend::DryRun => Ok(Arc::new(DryRunConnector::new())),
        #[cfg(all(feature = "smb", unix))]
        Backend::Smb => Ok(Arc::new(cifs_publisher::transfer::SmbConnector::new())),
        #[cfg(not(all(feature = "smb", unix)))]
        Backend::Smb => bail!("the smb backend is not available; rebuild with `--features smb`"),
    }
}

async fn load_config(
    shares_config: Option<PathBuf>,
    job_config: Option<PathBuf>,
    workspace: PathBuf,
) -> Result<LoadedConfig> {
    let options = ConfigLoadOptions {
        global_path: shares_config,
        job_path: job_config,
        workspace,
        env: ConfigLoader::process_env(),
    };

    ConfigLoader::load(options)
        .await
        .context("failed to load configuration")
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Publish {
            workspace,
            config,
            status,
            build_number,
            job_name,
            vars,
            backend,
            dry_run,
            json,
        } => {
            let workspace = workspace.unwrap_or_else(|| PathBuf::from("."));
            let backend = if dry_run { Backend::DryRun } else { backend };
            let loaded = load_config(cli.shares_config, config, workspace.clone()).await?;

            let mut build = BuildContext::new(status, &workspace)
                .with_variable("WORKSPACE", workspace.display().to_string())
                .with_variable(
                    "BUILD_TIMESTAMP",
                    chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string(),
                );
            if let Some(number) = build_number {
                build.set_variable("BUILD_NUMBER", number);
            }
            if let Some(name) = job_name {
                build.set_variable("JOB_NAME", name);
            }
            for (key, value) in vars {
                build.set_variable(key, value);
            }

            publish_command(loaded, build, backend, json).await
        }

        Commands::Check { share, backend } => {
            let loaded = load_config(cli.shares_config, None, PathBuf::from(".")).await?;
            check_command(loaded, share, backend).await
        }

        Commands::Shares => {
            let loaded = load_config(cli.shares_config, None, PathBuf::from(".")).await?;
            shares_command(loaded)
        }

        Commands::Validate { workspace, config } => {
            let workspace = workspace.unwrap_or_else(|| PathBuf::from("."));
            let loaded = load_config(cli.shares_config, config, workspace).await?;
            let result = ConfigLoader::validate(&loaded);
            println!("{}", ConfigLoader::format_validation_result(&result));
            Ok(if result.valid { 0 } else { 1 })
        }
    }
}

async fn publish_command(
    loaded: LoadedConfig,
    mut build: BuildContext,
    backend: Backend,
    json: bool,
) -> Result<i32> {
    let registry = Arc::new(ShareRegistry::with_shares(loaded.global.shares)?);

    let dry_run_connector = DryRunConnector::new();
    let connector: Arc<dyn ShareConnector> = match backend {
        Backend::DryRun => Arc::new(dry_run_connector.clone()),
        other => connector(other)?,
    };

    if !json {
        println!("\n📦 cifs-publish\n");
    }

    let coordinator = PublishCoordinator::new(registry, connector, loaded.job);
    let log = if json {
        ConsoleLog::stderr()
    } else {
        ConsoleLog::new()
    };
    let report = coordinator.publish(&mut build, &log).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(0);
    }

    if backend == Backend::DryRun {
        println!("\n🔍 Dry run, nothing was written:");
        for operation in dry_run_connector.operations() {
            println!("  {}", serde_json::to_string(&operation)?);
        }
    }

    print_summary(&report, build.status());
    Ok(0)
}

fn print_summary(report: &PublishReport, build_status: BuildStatus) {
    match report.status {
        PublishStatus::Skipped => {
            println!("\n⏭️  Build status is {}, nothing published", build_status);
        }
        PublishStatus::ShareNotFound => {
            println!("\n⚠️  No share selected, nothing published");
        }
        PublishStatus::Completed => {
            let failures = report.failures().count();
            if failures == 0 {
                println!("\n✅ Published {} files", report.files_copied);
            } else {
                println!(
                    "\n⚠️  Published {} files, {} failed",
                    report.files_copied, failures
                );
            }
        }
        PublishStatus::Degraded => {
            println!(
                "\n❌ Publishing aborted after {} files, build marked {}",
                report.files_copied, build_status
            );
        }
    }
}

async fn check_command(loaded: LoadedConfig, share: Option<String>, backend: Backend) -> Result<i32> {
    let registry = ShareRegistry::with_shares(loaded.global.shares)?;
    let share = registry.resolve(share.as_deref())?;
    let connector = connector(backend)?;

    println!("\n🔍 Checking {}\n", share.authenticated_url());
    let result = check_share(connector.as_ref(), &share).await;

    if result.is_ok() {
        println!("✅ {}", result);
        Ok(0)
    } else {
        println!("❌ {}", result);
        Ok(1)
    }
}

fn shares_command(loaded: LoadedConfig) -> Result<i32> {
    let registry = ShareRegistry::with_shares(loaded.global.shares)?;
    let shares = registry.list();

    if shares.is_empty() {
        println!("⚠️  No shares configured");
        return Ok(0);
    }

    println!("\n📂 Registered shares\n");
    for (index, share) in shares.iter().enumerate() {
        let default_marker = if index == 0 { " (default)" } else { "" };
        println!("  {}{}", share.display_url(), default_marker);
        println!("    server: {}", share.server);
        if let Some(user) = &share.user {
            match &share.domain {
                Some(domain) => println!("    user:   {}\\{}", domain, user),
                None => println!("    user:   {}", user),
            }
        }
        if let Some(mount_point) = &share.mount_point {
            println!("    mount:  {}", mount_point.display());
        }
    }

    Ok(0)
}
