//! WebSocket connection manager for tickerhub exchange streams.
//!
//! Provides one long-lived connection per exchange with:
//! - A `Disconnected → Connecting → Open` state machine with an explicit `Closing` stop
//! - Unbounded reconnection after a fixed, cancellable delay
//! - Subscription replay on every (re)connect through a `StreamSession`
//! - Heartbeat monitoring (idle ping, stale connection detection)

pub mod connection;
pub mod error;
pub mod heartbeat;

pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, StreamSession};
pub use error::{WsError, WsResult};
pub use heartbeat::HeartbeatManager;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
