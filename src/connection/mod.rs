use crate::channel::{ChannelState, ConnectionPhase, StaleResource};
use crate::config::ChannelConfig;
use crate::message::decode;
use anyhow::Result;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Error text surfaced when opening the transport fails
const OPEN_FAILURE_ERROR: &str = "Failed to connect";

/// Error text surfaced when an open transport fails
const TRANSPORT_ERROR: &str = "Connection failed";

/// Handle to a live real-time traffic channel.
///
/// Construction spawns a single driver task that owns the transport and
/// all channel state; exactly one transport connection is live or
/// pending-open at any time. Consumers read state through [`snapshot`]
/// or [`watch`] and tear the channel down with [`shutdown`] — there is
/// no ambient singleton, every channel is explicitly owned.
///
/// [`snapshot`]: TrafficChannel::snapshot
/// [`watch`]: TrafficChannel::watch
/// [`shutdown`]: TrafficChannel::shutdown
pub struct TrafficChannel {
    state_rx: watch::Receiver<ChannelState>,
    invalidation_tx: broadcast::Sender<StaleResource>,
    cancel: CancellationToken,
    driver: JoinHandle<()>,
}

impl TrafficChannel {
    /// Opens the channel and starts driving its connection lifecycle.
    ///
    /// The channel begins in [`ConnectionPhase::Connecting`] and retries
    /// failed connections indefinitely at the configured fixed interval.
    pub fn connect(config: ChannelConfig) -> Result<Self> {
        let endpoint = config.endpoint()?;
        let (state_tx, state_rx) = watch::channel(ChannelState::new());
        let (invalidation_tx, _) = broadcast::channel(16);
        let cancel = CancellationToken::new();

        let driver = tokio::spawn(run_driver(
            endpoint.to_string(),
            config.retry_interval(),
            state_tx,
            invalidation_tx.clone(),
            cancel.clone(),
        ));

        Ok(Self {
            state_rx,
            invalidation_tx,
            cancel,
            driver,
        })
    }

    /// Current channel state, cloned for the caller.
    pub fn snapshot(&self) -> ChannelState {
        self.state_rx.borrow().clone()
    }

    /// A receiver that observes every state change, for change-driven
    /// consumers (render on change rather than poll).
    pub fn watch(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Subscribe to cache-invalidation signals.
    ///
    /// A [`StaleResource`] is sent after every applied `traffic_update`;
    /// the external data-fetching layer decides whether that means
    /// eviction or a staleness mark.
    pub fn subscribe_invalidations(&self) -> broadcast::Receiver<StaleResource> {
        self.invalidation_tx.subscribe()
    }

    /// Tears the channel down: closes any live or pending connection,
    /// cancels a pending retry, and waits for the driver to exit.
    ///
    /// No state mutation occurs after this returns; the final phase is
    /// [`ConnectionPhase::Disconnected`].
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.driver.await;
    }
}

/// How a connected transport ended
enum Disconnect {
    /// Close frame or end of stream; not an error
    Clean,
    /// Transport-level failure while open
    Errored,
    /// Teardown requested
    Cancelled,
}

/// Connection lifecycle loop. Owns the transport and is the only writer
/// of channel state; each iteration opens at most one connection.
async fn run_driver(
    endpoint: String,
    retry_interval: std::time::Duration,
    state_tx: watch::Sender<ChannelState>,
    invalidation_tx: broadcast::Sender<StaleResource>,
    cancel: CancellationToken,
) {
    loop {
        state_tx.send_modify(|s| s.phase = ConnectionPhase::Connecting);

        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = tokio_tungstenite::connect_async(endpoint.as_str()) => result,
        };

        match connected {
            Ok((stream, _response)) => {
                info!(endpoint = %endpoint, "connected to real-time traffic stream");
                state_tx.send_modify(|s| {
                    s.phase = ConnectionPhase::Connected;
                    s.connection_error = None;
                });

                match read_frames(stream, &state_tx, &invalidation_tx, &cancel).await {
                    Disconnect::Cancelled => break,
                    Disconnect::Errored => {
                        state_tx.send_modify(|s| {
                            s.phase = ConnectionPhase::Reconnecting;
                            s.connection_error = Some(TRANSPORT_ERROR.to_string());
                        });
                    }
                    Disconnect::Clean => {
                        // A clean close is not an error; leave any prior
                        // error text untouched
                        info!("traffic stream closed");
                        state_tx.send_modify(|s| s.phase = ConnectionPhase::Reconnecting);
                    }
                }
            }
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "failed to open traffic stream");
                state_tx.send_modify(|s| {
                    s.phase = ConnectionPhase::Reconnecting;
                    s.connection_error = Some(OPEN_FAILURE_ERROR.to_string());
                });
            }
        }

        // Fixed-interval retry: same delay every time, no backoff, no cap
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(retry_interval) => {}
        }
    }

    state_tx.send_modify(|s| s.phase = ConnectionPhase::Disconnected);
}

/// Reads frames off an open transport until it closes, fails, or
/// teardown is requested. Frames are handled strictly in delivery
/// order, one at a time.
async fn read_frames(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    state_tx: &watch::Sender<ChannelState>,
    invalidation_tx: &broadcast::Sender<StaleResource>,
    cancel: &CancellationToken,
) -> Disconnect {
    // The write half stays bound so the transport isn't torn down;
    // this client never sends application frames.
    let (_write, mut read) = stream.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Disconnect::Cancelled,
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    handle_frame(text.as_str(), state_tx, invalidation_tx);
                }
                Some(Ok(Message::Close(_))) | None => return Disconnect::Clean,
                Some(Ok(_)) => {
                    // Ping/pong and binary frames carry no traffic data
                }
                Some(Err(e)) => {
                    warn!(error = %e, "traffic stream transport error");
                    return Disconnect::Errored;
                }
            }
        }
    }
}

/// Decodes and applies one text frame. Malformed frames are logged and
/// dropped without touching state.
fn handle_frame(
    raw: &str,
    state_tx: &watch::Sender<ChannelState>,
    invalidation_tx: &broadcast::Sender<StaleResource>,
) {
    match decode(raw) {
        Ok(msg) => {
            let mut stale = None;
            state_tx.send_modify(|s| stale = s.apply(msg));
            if let Some(resource) = stale {
                // No subscribers is fine; the signal is advisory
                let _ = invalidation_tx.send(resource);
            }
        }
        Err(e) => {
            warn!(error = %e, "dropping malformed stream frame");
        }
    }
}
