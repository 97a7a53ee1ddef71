use anyhow::Result;
use std::time::Duration;
use tracing::info;
use trafficlive::config::{load_config, ChannelConfig};
use trafficlive::connection::TrafficChannel;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trafficlive=info".into()),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => load_config(&path)?,
        None => ChannelConfig::default(),
    };

    info!(endpoint = %config.endpoint()?, "trafficlive starting");
    let channel = TrafficChannel::connect(config)?;

    let mut status = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = status.tick() => {
                let state = channel.snapshot();
                info!(
                    connected = state.is_connected(),
                    locations = state.updates.len(),
                    live_accidents = state.total_live_accidents(),
                    recent_alerts = state.recent_alerts.len(),
                    "stream status"
                );
                for area in state.top_congestion_areas() {
                    info!(
                        location = %area.location,
                        score = area.congestion_score,
                        level = %area.congestion_level,
                        "top congestion area"
                    );
                }
            }
        }
    }

    info!("shutting down");
    channel.shutdown().await;
    Ok(())
}
