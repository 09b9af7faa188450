use ghostwriter_provider::{init_logging, serve, GhostwriterProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let provider = GhostwriterProvider::new(env!("CARGO_PKG_VERSION"));
    tracing::info!(version = provider.version(), "Starting Ghostwriter provider");

    serve(provider).await
}
