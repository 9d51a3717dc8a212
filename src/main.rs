use tracing::info;
use tracing_subscriber::EnvFilter;

use watchparty_server::{config::Config, error::AppErr, hub::Hub};

#[tokio::main]
async fn main() -> Result<(), AppErr> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "watchparty_server=debug,info".into()),
        )
        .init();

    let config = Config::load()?;
    let hub    = Hub::spawn(config.hub_settings());
    let app    = watchparty_server::app(hub, config.session_settings(), config.static_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(config.server_address()).await?;
    info!("listening on ws://{}/ws", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
