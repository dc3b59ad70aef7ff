use clap::Parser;
use prodinfo_server::server::{
    config::{CliArgs, ServerConfig},
    lifecycle::ServerLifecycle,
    telemetry::init_telemetry,
};
use std::process::ExitCode;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let result = run(config).await;
    providers.shutdown();

    Ok(exit_code(&result))
}

/// Once telemetry is up, failures are reported through it only, so the error
/// never reaches anyhow's own printer.
fn exit_code(result: &prodinfo_core::Result<()>) -> ExitCode {
    match result {
        Ok(()) => {
            tracing::info!("Service shut down successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Any failure before `serve` returns ends the process with a non-zero
/// status; there is no degraded mode.
async fn run(config: ServerConfig) -> prodinfo_core::Result<()> {
    ServerLifecycle::new(config)
        .build_channel()?
        .bind()
        .await?
        .serve(shutdown_signal())
        .await?;
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting product info service on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!("Starting product info service on {}", config.server_addr);
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}
