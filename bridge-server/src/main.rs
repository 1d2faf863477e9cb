use bridge_server::{Config, Server, ServerState, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment (dotenv, logging)
    setup_environment();

    tracing::info!("Bridge server starting...");

    // 2. Load configuration
    let config = Config::from_env();

    // 3. Initialize server state (database, clients, sweep services)
    let state = ServerState::initialize(&config).await?;

    // 4. Run the HTTP server; background sweeps start with it
    let server = Server::with_state(config, state);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {e}");
        return Err(e.into());
    }

    Ok(())
}
