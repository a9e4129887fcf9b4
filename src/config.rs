//! Application configuration loaded from environment variables.
//!
//! Connection settings come from the environment:
//! - `DERIV_APP_ID` — numeric application id (defaults to the public demo id)
//! - `DERIV_API_TOKEN` — account token; required for live trading, optional
//!   for read-only streaming and simulation
//! - `DERIV_WEBSOCKET_URL` — overrides the default public endpoint
//!
//! Trading settings (symbol, granularity, stake, profit threshold) have
//! code defaults and are overridden by whatever the persistent store holds.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::auth::ApiToken;

/// Default public WebSocket endpoint (`app_id` is appended at connect time).
const DEFAULT_WEBSOCKET_URL: &str = "wss://ws.derivws.com/websockets/v3";

/// Public demo application id.
const DEFAULT_APP_ID: u32 = 1089;

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub websocket_url: String,
    pub app_id: u32,
    pub api_token: Option<ApiToken>,
}

impl AppConfig {
    /// Full connection URL including the application id query parameter.
    pub fn endpoint(&self) -> String {
        format!("{}?app_id={}", self.websocket_url, self.app_id)
    }
}

/// Operator-tunable trading settings.
///
/// Persisted across sessions by the store; every field has a sane default
/// so a fresh install can trade in simulation mode immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSettings {
    /// Instrument symbol, e.g. `R_100`.
    pub symbol: String,
    /// Candle granularity in seconds.
    pub granularity: u32,
    /// Stake per contract.
    pub stake: Decimal,
    /// Sell an open contract early once its profit reaches this value.
    pub profit_threshold: Decimal,
    /// Auto-trading check interval in milliseconds.
    pub auto_interval_ms: u64,
    /// When false, contract outcomes are simulated locally.
    pub live_mode: bool,
}

impl Default for TradeSettings {
    fn default() -> Self {
        Self {
            symbol: "R_100".to_string(),
            granularity: 60,
            stake: Decimal::ONE,
            profit_threshold: Decimal::new(5, 1),
            auto_interval_ms: 10_000,
            live_mode: false,
        }
    }
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`KestrelError::Config`](crate::KestrelError::Config) if
/// `DERIV_APP_ID` is set but not a valid number.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let websocket_url =
        non_empty_var("DERIV_WEBSOCKET_URL").unwrap_or_else(|| DEFAULT_WEBSOCKET_URL.to_string());

    let app_id = match non_empty_var("DERIV_APP_ID") {
        Some(raw) => raw.parse::<u32>().map_err(|_| {
            crate::KestrelError::Config(format!("DERIV_APP_ID is not a valid number: {raw}"))
        })?,
        None => DEFAULT_APP_ID,
    };

    let api_token = non_empty_var("DERIV_API_TOKEN").map(ApiToken::new);

    Ok(AppConfig {
        websocket_url,
        app_id,
        api_token,
    })
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
