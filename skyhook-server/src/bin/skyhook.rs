//! `skyhook`: cloud API tools over stdio JSON-RPC.

use anyhow::Context;
use tokio::io::BufReader;

use skyhook_core::ServerConfig;
use skyhook_server::{logging, ServerBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("invalid configuration")?;
    logging::init(&config.log_filter);

    let runtime = ServerBuilder::new(config)
        .with_module(skyhook_tools::aws::register_tools)
        .build()
        .context("failed to build tool registry")?;

    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();
    runtime.serve(reader, writer, shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
