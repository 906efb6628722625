use anyhow::{Context, Result};
use clap::Parser;
use orchestrator_core::config::WorkflowConfig;
use orchestrator_core::executor::TransitionExecutor;
use orchestrator_protocol::Dispatcher;
use orchestrator_server::config::Config;
use orchestrator_server::stdio::StdioMcpServer;
use orchestrator_server::telemetry;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "task-orchestrator", version, about = "Hierarchical task orchestration over MCP")]
struct Cli {
    /// Path to a TOML config file; falls back to env vars and shipped defaults.
    #[arg(long, env = "CONFIG_FILE")]
    config: Option<String>,

    /// SQLite connection string, e.g. sqlite:///var/lib/task-orchestrator.db
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// trace, debug, info, warn, or error
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Directory to search upward from for `.taskorchestrator/config.yaml`.
    #[arg(long)]
    project_root: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).context("failed to load config file")?,
        None => Config::from_env().context("failed to load configuration")?,
    };

    if let Some(url) = &cli.database_url {
        config.database.url = Some(url.clone());
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    telemetry::init_telemetry(&config.logging).context("failed to initialize telemetry")?;
    telemetry::log_config_validation(&config);
    config.validate().context("invalid configuration")?;
    telemetry::log_startup_info(&config);

    let project_root = cli
        .project_root
        .unwrap_or_else(orchestrator_server::config::default_workflow_config_start);
    let workflow_config =
        WorkflowConfig::load(&project_root).context("failed to load workflow config")?;

    let database_url = config.database_url();
    let store = orchestrator_database::SqliteStore::connect(&database_url)
        .await
        .context("failed to connect to database")?;
    store.migrate().await.context("failed to run migrations")?;

    let projects = Arc::new(store.projects());
    let features = Arc::new(store.features());
    let tasks = Arc::new(store.tasks());
    let sections = Arc::new(store.sections());
    let dependencies = Arc::new(store.dependencies());
    let role_transitions = Arc::new(store.role_transitions());

    let executor = Arc::new(TransitionExecutor::new(
        workflow_config.clone(),
        projects.clone(),
        features.clone(),
        tasks.clone(),
        sections.clone(),
        dependencies.clone(),
        role_transitions.clone(),
    ));

    let dispatcher = Arc::new(Dispatcher::new(
        workflow_config,
        projects,
        features,
        tasks,
        sections,
        dependencies,
        role_transitions,
        executor,
    ));

    let server = StdioMcpServer::new(dispatcher);

    tokio::select! {
        result = server.serve() => {
            result.context("stdio server loop failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            telemetry::log_shutdown_info();
        }
    }

    Ok(())
}
