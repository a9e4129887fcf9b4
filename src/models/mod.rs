//! Wire models for the brokerage WebSocket API.
//!
//! Only the minimal message shapes the client actually exchanges are
//! modelled: authorize, candle history, tick subscription, proposal, buy,
//! sell, open-contract updates and keep-alive pings. Everything else the
//! broker may send is ignored by the handler.

pub mod candle;
pub mod contract;
pub mod proposal;

use serde::{Deserialize, Serialize};

/// An `authorize` request carrying the account API token.
#[derive(Serialize)]
pub struct AuthorizeRequest {
    pub authorize: String,
}

/// Result payload of a successful `authorize` call.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeResponse {
    pub balance: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub loginid: String,
}

/// Keep-alive request; the broker drops idle connections.
#[derive(Serialize)]
pub struct PingRequest {
    pub ping: u8,
}

impl PingRequest {
    pub fn new() -> Self {
        Self { ping: 1 }
    }
}

impl Default for PingRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Error payload attached to any broker response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}
