//! # flymap-sync
//!
//! Real-time synchronization for live maps: a per-map session actor that
//! mirrors server-authoritative marker-group state, applies wire events in
//! arrival order, reconnects with bounded exponential backoff, and degrades
//! to server-rendered fallback when the budget is spent.
//!
//! ## Example
//!
//! ```rust,no_run
//! use flymap_core::MapConfig;
//! use flymap_sync::{session, HostConfig, WebSocketConnector};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let host = HostConfig {
//!         channel_topic: "map:fleet".to_string(),
//!         map_element_id: "fleet-map".to_string(),
//!         initial_state: None,
//!         progressive_enhancement: true,
//!     };
//!     let connector = WebSocketConnector::new("wss://example.com/live");
//!     let handle = session::spawn(host, MapConfig::default(), Some(Box::new(connector)))?;
//!
//!     // Observe renders, then shut down.
//!     println!("{}", handle.svg());
//!     handle.teardown().await;
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod mirror;
pub mod session;
pub mod state;
pub mod transport;

// Re-export commonly used types
pub use backoff::{attempts_remaining, reconnect_delay};
pub use mirror::{ApplyOutcome, MirrorState};
pub use session::{FallbackNotice, HostConfig, SessionCommand, SessionHandle};
pub use state::{ConnectionState, SessionStatus};
pub use transport::{Connector, Transport, WebSocketConnector, WebSocketTransport};
