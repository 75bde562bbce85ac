//! Shared types for the farmline platform: the realtime wire protocol and
//! the data models exchanged with the directory and notification services.

pub mod models;
pub mod protocol;
pub mod error;

pub use models::*;
pub use protocol::*;
pub use error::*;
