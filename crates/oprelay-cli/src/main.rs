//! oprelay CLI
//!
//! Operator driver for the execution engine: runs protocol verbs against
//! environments named in the config file.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use eyre::eyre;
use tracing_subscriber::EnvFilter;

use oprelay_api::{
    EnvVars, ExecutionRequest, ExecutionResponse, LogLevel, LogRequest, RunBashRequest,
    RunExpectRequest, RunPowerShellRequest, RunSyncRequest,
};
use oprelay_engine::{EngineOptions, ExecutionEngine, TracingLogSink};
use oprelay_exec::ConnectionResolver;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "oprelay")]
#[command(about = "Remote operation execution engine", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a bash command on a Unix environment
    RunBash {
        /// Environment name from the config
        environment: String,
        /// Command or script body
        command: String,
        /// NAME=VALUE pairs exported into the command's environment
        #[arg(short = 'e', long = "env")]
        vars: Vec<String>,
        /// Start bash as a login shell
        #[arg(long)]
        login_shell: bool,
    },
    /// Run a PowerShell script on a Windows environment
    RunPowershell {
        environment: String,
        command: String,
        #[arg(short = 'e', long = "env")]
        vars: Vec<String>,
    },
    /// Run an expect (TCL) script on a Unix environment
    RunExpect {
        environment: String,
        command: String,
        #[arg(short = 'e', long = "env")]
        vars: Vec<String>,
    },
    /// Pull a remote directory into the local content store
    Sync {
        environment: String,
        /// Remote directory to transfer
        source_directory: String,
        /// User authenticating the transfer (defaults to the environment user)
        #[arg(long)]
        rsync_user: Option<String>,
        /// Glob patterns excluded from the transfer
        #[arg(long = "exclude")]
        exclude_paths: Vec<String>,
        /// Symbolic links to dereference and copy as files
        #[arg(long = "follow-link")]
        sym_links_to_follow: Vec<String>,
    },
    /// Record a log message
    Log {
        /// debug, info, or error
        level: String,
        message: String,
    },
    /// List configured environments
    Environments,
}

fn parse_vars(pairs: &[String]) -> Result<EnvVars> {
    let mut vars = EnvVars::new();
    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| eyre!("expected NAME=VALUE, got {pair:?}"))?;
        vars.insert(name, value);
    }
    Ok(vars)
}

fn parse_level(level: &str) -> Result<LogLevel> {
    match level.to_ascii_lowercase().as_str() {
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "error" => Ok(LogLevel::Error),
        other => Err(eyre!("unknown log level {other:?} (debug|info|error)")),
    }
}

fn build_engine(options: EngineOptions) -> ExecutionEngine {
    ExecutionEngine::new(
        ConnectionResolver::new(),
        Arc::new(TracingLogSink::new()),
        options,
    )
}

fn connection_for(config: &Config, name: &str) -> Result<oprelay_api::RemoteConnection> {
    config
        .environment(name)
        .map(config::EnvironmentConfig::connection)
        .ok_or_else(|| eyre!("environment {name:?} is not configured"))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    let request = match cli.command {
        Commands::RunBash {
            environment,
            command,
            vars,
            login_shell,
        } => ExecutionRequest::RunBash(RunBashRequest {
            remote_connection: connection_for(&config, &environment)?,
            command,
            variables: parse_vars(&vars)?,
            use_login_shell: login_shell,
        }),
        Commands::RunPowershell {
            environment,
            command,
            vars,
        } => ExecutionRequest::RunPowerShell(RunPowerShellRequest {
            remote_connection: connection_for(&config, &environment)?,
            command,
            variables: parse_vars(&vars)?,
        }),
        Commands::RunExpect {
            environment,
            command,
            vars,
        } => ExecutionRequest::RunExpect(RunExpectRequest {
            remote_connection: connection_for(&config, &environment)?,
            command,
            variables: parse_vars(&vars)?,
        }),
        Commands::Sync {
            environment,
            source_directory,
            rsync_user,
            exclude_paths,
            sym_links_to_follow,
        } => ExecutionRequest::RunSync(RunSyncRequest {
            remote_connection: connection_for(&config, &environment)?,
            source_directory,
            rsync_user,
            exclude_paths,
            sym_links_to_follow,
        }),
        Commands::Log { level, message } => ExecutionRequest::Log(LogRequest {
            level: parse_level(&level)?,
            message,
        }),
        Commands::Environments => {
            for env in &config.environment {
                println!("{}\t{}@{}:{}\t{}", env.name, env.user, env.addr, env.port, env.platform);
            }
            return Ok(());
        }
    };

    let engine = build_engine(config.engine.options());
    let response = engine
        .execute(request)
        .await
        .map_err(|e| eyre!("{e}"))?;

    match response {
        ExecutionResponse::Command(out) => {
            print!("{}", out.stdout);
            eprint!("{}", out.stderr);
        }
        ExecutionResponse::Synced => println!("sync complete"),
        ExecutionResponse::Logged => {}
    }

    Ok(())
}
