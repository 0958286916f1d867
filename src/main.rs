use crudroute::prelude::*;
use std::process::ExitCode;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Startup failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> crudroute::Result<()> {
    let config = ConfigService::load();
    let server = config.server_config()?;
    tracing::info!(
        "Starting {} in {} mode",
        crudroute::interceptor::POWERED_BY,
        server.environment
    );

    // Both registries are complete before the socket opens.
    let models = ModelRegistry::connect(&config.database_config(), &server.models_dir).await?;
    let controllers =
        ControllerRegistry::discover(&server.controllers_dir, ControllerCatalog::new())?;

    let app = App::builder()
        .models(models)
        .controllers(controllers)
        .expose_error_stack(server.expose_error_stack)
        .build();

    let listener = TcpListener::bind(server.bind_addr()).await?;
    app.serve(listener).await?;
    Ok(())
}
