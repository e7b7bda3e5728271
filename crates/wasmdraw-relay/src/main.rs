//! wasm-draw relay binary.
//!
//! Configured through `WASMDRAW_RELAY_ADDR` and
//! `WASMDRAW_RELAY_CHANNEL_CAPACITY`; log filtering through `RUST_LOG`.

use wasmdraw_relay::RelayConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wasmdraw_relay=info,tower_http=info".into()),
        )
        .init();

    let config = RelayConfig::from_env()?;
    wasmdraw_relay::run(config).await?;
    Ok(())
}
