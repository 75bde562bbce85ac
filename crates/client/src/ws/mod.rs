//! Realtime channel: one managed connection with bounded auto-reconnect and
//! typed event fan-out.
//!
//! # Architecture
//!
//! ```text
//! caller ── connect / disconnect / send ──► RealtimeClient
//!                                               │
//!                                 Connector opens a Transport
//!                                               │
//!              opened / message / closed / errored signals
//!                                               │
//!                                               ▼
//!                                          EventRouter
//!                                               │
//!                          ┌────────────────────┼────────────────────┐
//!                          ▼                    ▼                    ▼
//!                     listener A           listener B           listener C
//! ```
//!
//! Every transport lifecycle signal is normalized into a [`RealtimeEvent`]
//! and fanned out under its event-type string: `connected`, `disconnected`
//! and `error` are produced internally, everything else is the inbound
//! envelope's own `type`. Listeners survive reconnection; the registry is
//! never cleared by the manager.
//!
//! Readiness is observed, not returned: `connect` only fails for a missing
//! or invalid endpoint configuration, and every transport failure after that
//! arrives as an event (or drives the reconnect policy).

mod connection;
mod manager;
mod router;
mod transport;

pub use connection::{ConnectionState, ReconnectConfig};
pub use manager::{RealtimeClient, RealtimeConfig, RealtimeError, RealtimeEvent};
pub use router::{listener, EventRouter, Listener};
pub use transport::{Connector, Transport, TransportError, TransportSignal, WsConnector};
