use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use panel_relay::config::AppConfig;
use panel_relay::error::{ControlError, ErrorBody, ErrorCode};
use panel_relay::logging;
use panel_relay::service::ControlPanel;

#[derive(Parser)]
#[command(name = "panel-relay")]
#[command(version, about = "Plugin installer and status relay for a managed game server")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Install a plugin from the registry
    Install {
        project_id: String,
        #[arg(long)]
        version: Option<String>,
    },
    /// Replace an installed plugin with another version
    Update {
        project_id: String,
        #[arg(long)]
        version: Option<String>,
    },
    /// Install a jar from local disk, replacing any plugin with the same file name
    Upload { path: PathBuf },
    /// Move an installed plugin into the backup directory
    Remove { name: String },
    /// List installed plugins
    Plugins,
    /// Search plugins compatible with the server
    Search {
        #[arg(default_value = "")]
        query: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Show project details
    Project { project_id: String },
    /// Show the normalized server status
    Status,
    Start,
    Stop,
    /// Restart the server, optionally after a delay
    Restart {
        #[arg(long, default_value_t = 0)]
        delay: u64,
    },
    /// Print recent console lines
    Logs,
    /// Send a console command
    #[command(name = "command")]
    Console { line: String },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    let _guard = logging::init(&config.logging)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli.command, &config))
}

async fn run(command: Command, config: &AppConfig) -> anyhow::Result<ExitCode> {
    let service = ControlPanel::from_config(config)?;

    let code = match command {
        Command::Install {
            project_id,
            version,
        } => respond(service.install_plugin(&project_id, version.as_deref()).await),
        Command::Update {
            project_id,
            version,
        } => respond(service.update_plugin(&project_id, version.as_deref()).await),
        Command::Upload { path } => respond(service.install_local(&path).await),
        Command::Remove { name } => respond(service.remove_plugin(&name).await),
        Command::Plugins => respond(service.list_plugins().await),
        Command::Search {
            query,
            limit,
            offset,
        } => respond(service.search(&query, limit, offset).await),
        Command::Project { project_id } => respond(service.get_project(&project_id).await),
        Command::Status => respond(service.get_canonical_status().await),
        Command::Start => respond(service.start().await),
        Command::Stop => respond(service.stop().await),
        Command::Restart { delay } => match service.restart(delay).await {
            Ok(scheduled) => {
                let code = respond::<_, ControlError>(Ok(&scheduled.ack));
                // The process would exit before a delayed restart fires
                if let Some(handle) = scheduled.handle {
                    handle.await?;
                }
                code
            }
            Err(e) => respond::<(), _>(Err(e)),
        },
        Command::Logs => respond(service.logs().await),
        Command::Console { line } => respond(
            service
                .send_command(&line)
                .await
                .map(|()| serde_json::json!({ "sent": line })),
        ),
    };

    Ok(code)
}

fn respond<T, E>(result: Result<T, E>) -> ExitCode
where
    T: Serialize,
    E: ErrorCode + std::fmt::Display,
{
    let (output, code) = match result {
        Ok(value) => (serde_json::to_string_pretty(&value), ExitCode::SUCCESS),
        Err(e) => (
            serde_json::to_string_pretty(&ErrorBody::from_error(&e)),
            ExitCode::FAILURE,
        ),
    };

    match output {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("failed to encode output: {}", e);
            return ExitCode::FAILURE;
        }
    }
    code
}
