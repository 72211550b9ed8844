#![forbid(unsafe_code)]

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use sql_identity_resolver::cli::{Cli, Commands};
use sql_identity_resolver::config::Config;
use sql_identity_resolver::db::{DatabaseManager, Provisioner};
use sql_identity_resolver::metrics::Metrics;
use sql_identity_resolver::utils::logging::init_tracing;
use sql_identity_resolver::web::WebServer;
use sql_identity_resolver::{IdentityResolver, Resolution, RetryPolicy};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = Arc::new(Config::load(cli.config.as_deref())?);
    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Provision { fixture, seeds } => {
            let provisioner = Provisioner::new(&config.database)?;
            provisioner.create_schema().await?;
            let records = Commands::seed_records(fixture, &seeds);
            if !records.is_empty() {
                provisioner.seed(records).await?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Teardown => {
            Provisioner::new(&config.database)?.drop_schema().await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Resolve { token } => {
            let resolver = connect(&config).await?;
            let outcome = resolver.resolve(&token).await;
            println!("{}", serde_json::to_string(&outcome)?);
            Ok(match outcome {
                Resolution::Resolved { .. } => ExitCode::SUCCESS,
                Resolution::Rejected { .. } => ExitCode::FAILURE,
            })
        }
    }
}

async fn connect(config: &Config) -> Result<IdentityResolver> {
    let db_manager = DatabaseManager::new(&config.database).await?;
    Ok(IdentityResolver::new(
        db_manager.store(),
        RetryPolicy::from(config),
    ))
}

async fn serve(config: Arc<Config>) -> Result<ExitCode> {
    Metrics::start();
    info!("sql identity resolver starting up");

    let resolver = connect(&config).await?;
    let web_server = WebServer::new(config.clone(), resolver);

    let web_handle = tokio::spawn(async move {
        if let Err(e) = web_server.start().await {
            error!("web server error: {}", e);
        }
    });

    tokio::select! {
        _ = web_handle => {},
        _ = tokio::signal::ctrl_c() => {},
    }

    info!("sql identity resolver shutting down");
    Ok(ExitCode::SUCCESS)
}
