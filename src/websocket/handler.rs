//! Incoming WebSocket message processing.
//!
//! Parses broker messages into typed [`FeedEvent`]s and forwards them to
//! the runner's single-consumer channel. Unknown message types are logged
//! and skipped; an error payload on any message becomes an
//! [`FeedEvent::ApiError`] rather than a crash.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use tungstenite::Message;

use super::WsReader;
use crate::Result;
use crate::models::candle::{CandleHistoryResponse, TickResponse};
use crate::models::contract::{BuyResponse, OpenContractResponse, SellResponse};
use crate::models::proposal::ProposalResponse;
use crate::models::{ApiError, AuthorizeResponse};
use crate::runner::FeedEvent;

/// Reads and dispatches incoming WebSocket messages until the connection
/// closes, then emits [`FeedEvent::Disconnected`].
///
/// # Errors
///
/// Returns a [`KestrelError`](crate::KestrelError) if reading from the
/// WebSocket fails. Malformed payloads inside otherwise well-formed
/// messages are logged and skipped, not fatal.
pub async fn process_messages(read: &mut WsReader, tx: mpsc::Sender<FeedEvent>) -> Result<()> {
    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "WebSocket read failed");
                break;
            }
        };

        if let Message::Text(text) = msg {
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(value) => {
                    if let Some(event) = dispatch_message(value) {
                        if tx.send(event).await.is_err() {
                            // Runner is gone; no point reading further.
                            return Ok(());
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Discarding unparseable message"),
            }
        }
    }

    let _ = tx.send(FeedEvent::Disconnected).await;
    Ok(())
}

/// Routes one parsed message to its typed event, if any.
fn dispatch_message(value: serde_json::Value) -> Option<FeedEvent> {
    // Error payloads take priority whatever the message type.
    if value.get("error").is_some() {
        let error: ApiError = serde_json::from_value(value["error"].clone()).unwrap_or(ApiError {
            code: "unknown".to_string(),
            message: value["error"].to_string(),
        });
        return Some(FeedEvent::ApiError {
            code: error.code,
            message: error.message,
        });
    }

    let msg_type = value.get("msg_type").and_then(|t| t.as_str())?;

    match msg_type {
        "authorize" => match serde_json::from_value::<AuthorizeResponse>(value["authorize"].clone())
        {
            Ok(auth) => Some(FeedEvent::Authorized {
                balance: auth.balance,
            }),
            Err(e) => {
                warn!(error = %e, "Malformed authorize payload");
                None
            }
        },
        "candles" => match serde_json::from_value::<CandleHistoryResponse>(value.clone()) {
            Ok(history) => Some(FeedEvent::CandleSnapshot(history.candles)),
            Err(e) => {
                warn!(error = %e, "Malformed candles payload");
                None
            }
        },
        "tick" => match serde_json::from_value::<TickResponse>(value.clone()) {
            Ok(response) => Some(FeedEvent::Tick(response.tick)),
            Err(e) => {
                warn!(error = %e, "Malformed tick payload");
                None
            }
        },
        "proposal" => match serde_json::from_value::<ProposalResponse>(value.clone()) {
            Ok(response) => Some(FeedEvent::Proposal(response.proposal)),
            Err(e) => {
                warn!(error = %e, "Malformed proposal payload");
                None
            }
        },
        "buy" => match serde_json::from_value::<BuyResponse>(value.clone()) {
            Ok(response) => Some(FeedEvent::PurchaseConfirmed(response.buy)),
            Err(e) => {
                warn!(error = %e, "Malformed buy payload");
                None
            }
        },
        "proposal_open_contract" => {
            match serde_json::from_value::<OpenContractResponse>(value.clone()) {
                Ok(response) => Some(FeedEvent::ContractUpdate(response.proposal_open_contract)),
                Err(e) => {
                    warn!(error = %e, "Malformed open-contract payload");
                    None
                }
            }
        }
        "sell" => match serde_json::from_value::<SellResponse>(value.clone()) {
            Ok(response) => Some(FeedEvent::SellConfirmed(response.sell)),
            Err(e) => {
                warn!(error = %e, "Malformed sell payload");
                None
            }
        },
        "ping" | "pong" => {
            debug!("Keep-alive acknowledged");
            None
        }
        other => {
            debug!(msg_type = other, "Ignoring unhandled message type");
            None
        }
    }
}
