//! Veridian OpenID provider server binary.

mod app;
mod config;
mod gateways;
mod seed;
mod telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; only surface real read failures.
    if let Err(e) = dotenvy::dotenv()
        && !matches!(e, dotenvy::Error::Io(ref io) if io.kind() == std::io::ErrorKind::NotFound)
    {
        eprintln!("Warning: failed to load .env file: {e}");
    }

    telemetry::init_tracing();

    let config = config::load()?;
    let listen = config.listen.clone();
    let issuer = config.idp.issuer.clone();
    let router = app::build(&config).await?;

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!(listen = %listen, issuer = %issuer, "server started");
    axum::serve(listener, router).await?;
    Ok(())
}
