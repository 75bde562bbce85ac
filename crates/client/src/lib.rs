//! Farmline client core.
//!
//! The interesting part is the [`ws`] module: a managed realtime connection
//! with bounded auto-reconnect and typed event fan-out. The rest is thin
//! request/response plumbing for the collaborator services (user directory,
//! email/SMS notification endpoints).

pub mod api_client;
pub mod directory;
pub mod logging;
pub mod notify;
pub mod ws;

pub use api_client::ApiClient;
pub use directory::DirectoryClient;
pub use notify::NotifyClient;
pub use ws::{
    ConnectionState, RealtimeClient, RealtimeConfig, RealtimeError, RealtimeEvent,
};
