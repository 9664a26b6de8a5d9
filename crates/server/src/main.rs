mod api;
mod cli;
mod error;
mod feed;
mod hitl;
mod router;
mod sar;
mod scan;
mod startup;
mod state;

use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use lexinel_core::config::{load_dotenv, Config};

use crate::cli::{Cli, Command};

async fn serve(config: &Config) -> anyhow::Result<()> {
    let state = startup::build_app_state(config)?;
    startup::spawn_background(&state);

    let app = router::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    info!("API docs at http://localhost:{}/docs", config.server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lexinel_server=info,lexinel_rules=info,lexinel_llm=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            config.log_summary();
            serve(&config).await
        }
        Command::Scan { verbose } => cli::scan(&config, verbose),
        Command::ValidateRules { file } => cli::validate_rules(&config, file),
    }
}
