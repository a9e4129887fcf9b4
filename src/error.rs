//! Crate-level error types.
//!
//! [`KestrelError`] unifies every error source (configuration, WebSocket,
//! JSON, persistence, broker API) behind a single enum so callers can match
//! on the variant they care about while still using the `?` operator for
//! easy propagation.
//!
//! Insufficient market data is deliberately *not* an error: analysis
//! functions report "not ready" values and the decision engine degrades to
//! HOLD instead.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KestrelError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum KestrelError {
    /// A configuration value was missing or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A message from the broker could not be interpreted.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The broker answered a request with an error payload.
    #[error("api error [{code}]: {message}")]
    Api { code: String, message: String },

    /// Reading or writing the persistent store failed.
    #[error("store error: {0}")]
    Store(#[from] std::io::Error),
}
