//! Transport abstraction over the realtime socket.
//!
//! The manager drives a [`Transport`] it obtained from a [`Connector`] and
//! reacts to the [`TransportSignal`]s the connector delivers on a channel.
//! Production uses [`WsConnector`] (tokio-tungstenite); tests substitute a
//! scripted connector so the state machine runs without a real socket.

use futures_channel::mpsc::{unbounded, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info};

/// Lifecycle signals a transport delivers to the manager.
#[derive(Debug, Clone)]
pub enum TransportSignal {
    /// The handshake finished; the transport is ready for frames.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// The transport closed, cleanly or not. Always the final signal.
    Closed,
    /// The transport reported an error. Does not imply closure by itself.
    Errored(String),
}

/// Write half of a transport session.
pub trait Transport: Send {
    /// Queue a text frame for the peer.
    fn send(&mut self, text: String) -> Result<(), TransportError>;
    /// Request the transport to close. The `Closed` signal still follows.
    fn close(&mut self);
}

/// Opens transports toward a target URL.
///
/// `connect` must not block: failures to establish the connection are
/// reported asynchronously as `Errored` followed by `Closed`.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &str, signals: UnboundedSender<TransportSignal>)
        -> Box<dyn Transport>;
}

/// Error writing to a transport.
#[derive(Debug, Clone, Error)]
#[error("transport write failed: {0}")]
pub struct TransportError(pub String);

enum OutboundFrame {
    Text(String),
    Close,
}

/// WebSocket connector backed by tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(
        &self,
        url: &str,
        signals: UnboundedSender<TransportSignal>,
    ) -> Box<dyn Transport> {
        let (out_tx, mut out_rx) = unbounded::<OutboundFrame>();
        let url = url.to_string();

        tokio::spawn(async move {
            let (ws_stream, _response) = match connect_async(&url).await {
                Ok(ok) => ok,
                Err(e) => {
                    error!("WebSocket connect to {} failed: {}", url, e);
                    let _ = signals.unbounded_send(TransportSignal::Errored(e.to_string()));
                    let _ = signals.unbounded_send(TransportSignal::Closed);
                    return;
                }
            };

            info!("WebSocket connected to {}", url);
            let _ = signals.unbounded_send(TransportSignal::Opened);

            let (mut write, mut read) = ws_stream.split();

            // Either task finishing means the session is over.
            let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel::<()>();

            // Read task: forward inbound frames until the stream ends.
            let signals_for_read = signals.clone();
            let done_for_read = done_tx.clone();
            tokio::spawn(async move {
                while let Some(msg) = read.next().await {
                    match msg {
                        Ok(Message::Text(text)) => {
                            let _ = signals_for_read
                                .unbounded_send(TransportSignal::Message(text.to_string()));
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(Message::Ping(data)) => {
                            // Pong is handled by tungstenite itself.
                            debug!("received ping: {:?}", data);
                        }
                        Ok(_) => {
                            // Binary, pong, etc.
                        }
                        Err(e) => {
                            let _ = signals_for_read
                                .unbounded_send(TransportSignal::Errored(e.to_string()));
                            break;
                        }
                    }
                }
                let _ = done_for_read.send(());
            });

            // Write task: drain queued outbound frames.
            tokio::spawn(async move {
                while let Some(frame) = out_rx.next().await {
                    match frame {
                        OutboundFrame::Text(text) => {
                            if let Err(e) = write.send(Message::Text(text.into())).await {
                                error!("WebSocket send failed: {}", e);
                                break;
                            }
                        }
                        OutboundFrame::Close => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }
                let _ = done_tx.send(());
            });

            done_rx.recv().await;
            info!("WebSocket to {} closed", url);
            let _ = signals.unbounded_send(TransportSignal::Closed);
        });

        Box::new(WsTransport { outbound: out_tx })
    }
}

struct WsTransport {
    outbound: UnboundedSender<OutboundFrame>,
}

impl Transport for WsTransport {
    fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.outbound
            .unbounded_send(OutboundFrame::Text(text))
            .map_err(|e| TransportError(e.to_string()))
    }

    fn close(&mut self) {
        let _ = self.outbound.unbounded_send(OutboundFrame::Close);
    }
}
