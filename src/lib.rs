//! Adaptive decision engine for binary contract trading.
//!
//! Streams candles and ticks from a Deriv-style brokerage over a
//! persistent WebSocket, fuses indicators, candlestick patterns, market
//! mood and tick micro-structure into a per-cycle trading decision, and
//! manages at most one contract at a time through an explicit lock state
//! machine. Trades settle live against the broker or locally through the
//! simulation engine; either way the outcomes feed the adaptive weighting
//! and agent-selection loops.

pub mod analysis;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod lock;
pub mod models;
pub mod runner;
pub mod session;
pub mod simulation;
pub mod store;
pub mod websocket;

pub use error::{KestrelError, Result};
