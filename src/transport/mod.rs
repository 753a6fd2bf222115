//! Transport Layer
//!
//! Everything that talks to the network: JSON and binary HTTP requests,
//! streamed bodies decoded into [`crate::streaming::EventSource`]s, polling of
//! long-running tasks, and WebSocket sessions. Provider adapters compose these
//! primitives; none of them know about parameters or content types.

pub mod http;
pub mod polling;
#[cfg(feature = "websocket")]
pub mod websocket;

pub use http::HttpTransport;
pub use polling::{PollConfig, PollStatus};
