use http_server::{AppState, config::fetch_config, serve};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // initialize tracing
    tracing_subscriber::fmt::init();

    let config = fetch_config()?;

    // Initialize ledger, rate tables and the provider client
    let state = AppState::from_config(&config)?;
    tracing::info!("In-memory ledger initialized successfully");
    if state.upstream.is_sandbox() {
        tracing::info!("VTU upstream in sandbox mode, orders are simulated");
    } else {
        tracing::info!("VTU upstream connected to live aggregator");
    }

    // run our app with hyper on the configured address
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server running on http://{}", config.bind_addr);
    serve(listener, state).await?;

    Ok(())
}
