use std::{env, net::SocketAddr};

use chat_stream_relay::config::RelayConfig;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if RelayConfig::loads_dotenv(|name| env::var(name).ok()) {
        // A missing .env file is fine; the variables may come from the environment.
        dotenv::dotenv().ok();
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chat_stream_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(config_error) => {
            error!(error = %config_error, "refusing to start without upstream configuration");
            return Err(config_error.into());
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = chat_stream_relay::build_state(config)?;
    let app = chat_stream_relay::build_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "relay listening");

    axum::serve(listener, app).await?;
    Ok(())
}
