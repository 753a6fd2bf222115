//! # Omnigen
//!
//! One client abstraction for text, image, video, speech and music generation
//! across heterogeneous provider APIs.
//!
#![deny(unsafe_code)]

//! ## Pieces
//!
//! - **Constraints** ([`constraints`]): per-model validation and
//!   normalization of capability-neutral parameters.
//! - **Mappers** ([`params`]): translate validated parameters into each
//!   provider's request shape, and post-process typed output.
//! - **Registry** ([`registry`]): models and the adapters that serve them,
//!   held in an explicit value.
//! - **Streaming** ([`streaming`]): SSE, NDJSON, binary, WebSocket and
//!   polling sources normalized into one [`ChunkStream`] of typed chunks.
//! - **Protocols** ([`protocols`]) and **providers** ([`providers`]): wire
//!   formats and the provider adapters built on them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use omnigen::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let omni = Omnigen::from_env()?;
//!     let client = omni.create_client(Capability::TextGeneration, "gpt-4o", None)?;
//!
//!     let mut stream = client
//!         .stream(&Input::text("Write a haiku about tides"), &Parameters::new())
//!         .await?;
//!     while let Some(chunk) = stream.next().await {
//!         if let Some(text) = chunk?.content.as_text() {
//!             print!("{text}");
//!         }
//!     }
//!     println!("\n{:?}", stream.output()?.usage);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod constraints;
pub mod error;
pub mod params;
pub mod protocols;
pub mod providers;
pub mod registry;
pub mod streaming;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use auth::{ApiKey, Authentication, Credentials};
pub use client::{Client, Omnigen, OmnigenBuilder};
pub use config::ClientConfig;
pub use constraints::{Constraint, Dimensions, Voice};
pub use error::{ApiErrorKind, ErrorCategory, OmniError, Result};
pub use registry::{Model, Registry};
pub use streaming::{ChunkStream, StreamState};
pub use types::{
    Artifact, Capability, Chunk, ChunkContent, Content, FinishReason, Input, MediaKind, MimeType,
    Output, OutputSchema, Param, ParamValue, Parameters, Provider, Tool, Usage,
};

pub mod prelude {
    pub use crate::client::{Client, Omnigen};
    pub use crate::config::ClientConfig;
    pub use crate::error::{OmniError, Result};
    pub use crate::types::{
        Artifact, Capability, ChunkContent, Content, Input, MediaKind, Output, Param, Parameters,
        Provider,
    };
    pub use crate::Credentials;
}

static_assertions::assert_impl_all!(Registry: Send, Sync);
static_assertions::assert_impl_all!(Client: Send, Sync, Clone);
static_assertions::assert_impl_all!(Omnigen: Send, Sync);
static_assertions::assert_impl_all!(ChunkStream: Send);
static_assertions::assert_impl_all!(OmniError: Send, Sync);
