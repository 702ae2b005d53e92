use std::net::SocketAddr;
use urlsigner::{config::UrlSignerConfig, router};

/// Standalone signing service.
///
/// # Configuration
/// Environment variables:
/// - `URLSIGNER_SECRET`: HMAC secret (required)
/// - `URLSIGNER_DEFAULT_TTL`: seconds until signed URLs expire when no `ttl`
///   is given (default: 3600, `none` disables expiry)
/// - `PORT`: HTTP listen port (default: 8080)
/// - `RUST_LOG`: Logging verbosity (default: "urlsigner=debug,tower_http=info")
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "urlsigner=debug,tower_http=info".into())
        )
        .init();

    tracing::info!("Starting urlsigner server");

    let cfg = UrlSignerConfig::from_env()?;
    cfg.validate()?;

    // Bind to 0.0.0.0 for containerized deployment
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let app = router(cfg);

    tracing::info!("Server listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
