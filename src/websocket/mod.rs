//! Async WebSocket transport to the brokerage.
//!
//! This module is deliberately thin: it connects, authorizes, sends the
//! handful of request shapes the core emits, and parses inbound messages
//! into typed [`FeedEvent`](crate::runner::FeedEvent)s for the runner. All
//! trading logic lives behind the session; nothing here touches shared
//! state.

mod handler;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};
use tungstenite::Message;

use crate::Result;
use crate::auth::ApiToken;
use crate::models::candle::{CandleHistoryRequest, TickSubscribeRequest};
use crate::models::contract::{BuyRequest, SellRequest};
use crate::models::proposal::ProposalRequest;
use crate::models::{AuthorizeRequest, PingRequest};

pub use handler::process_messages;

/// Write half of a brokerage WebSocket connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of a brokerage WebSocket connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Establishes a WebSocket connection to the given endpoint.
///
/// # Errors
///
/// Returns a [`KestrelError`](crate::KestrelError) if the connection or
/// TLS handshake fails.
pub async fn connect(endpoint: &str) -> Result<(WsWriter, WsReader)> {
    let (ws_stream, _) = connect_async(endpoint).await?;
    info!("WebSocket handshake completed");

    Ok(ws_stream.split())
}

async fn send_json<T: serde::Serialize>(write: &mut WsWriter, request: &T) -> Result<()> {
    let json = serde_json::to_string(request)?;
    write.send(Message::Text(json.into())).await?;
    Ok(())
}

/// Sends the account token for authorization.
///
/// # Errors
///
/// Returns a [`KestrelError`](crate::KestrelError) if sending fails.
pub async fn authorize(write: &mut WsWriter, token: &ApiToken) -> Result<()> {
    send_json(
        write,
        &AuthorizeRequest {
            authorize: token.expose().to_string(),
        },
    )
    .await?;
    info!("Sent authorization request");

    Ok(())
}

/// Requests a window of historical candles.
///
/// # Errors
///
/// Returns a [`KestrelError`](crate::KestrelError) if sending fails.
pub async fn request_candles(
    write: &mut WsWriter,
    symbol: &str,
    granularity: u32,
    count: usize,
) -> Result<()> {
    send_json(write, &CandleHistoryRequest::new(symbol, granularity, count)).await?;
    info!(symbol, granularity, count, "Requested candle history");

    Ok(())
}

/// Subscribes to the live tick stream for a symbol.
///
/// # Errors
///
/// Returns a [`KestrelError`](crate::KestrelError) if sending fails.
pub async fn subscribe_ticks(write: &mut WsWriter, symbol: &str) -> Result<()> {
    send_json(write, &TickSubscribeRequest::new(symbol)).await?;
    info!(symbol, "Subscribed to ticks");

    Ok(())
}

/// Requests a priced proposal for a contract.
///
/// # Errors
///
/// Returns a [`KestrelError`](crate::KestrelError) if sending fails.
pub async fn send_proposal(write: &mut WsWriter, request: &ProposalRequest) -> Result<()> {
    send_json(write, request).await?;
    info!(
        symbol = %request.symbol,
        contract_type = request.contract_type.as_str(),
        duration = request.duration,
        "Requested proposal"
    );

    Ok(())
}

/// Buys a received proposal.
///
/// # Errors
///
/// Returns a [`KestrelError`](crate::KestrelError) if sending fails.
pub async fn send_buy(write: &mut WsWriter, proposal_id: &str, price: Decimal) -> Result<()> {
    send_json(write, &BuyRequest::new(proposal_id, price)).await?;
    info!(proposal_id, %price, "Sent buy");

    Ok(())
}

/// Sells an open contract back at the current bid.
///
/// # Errors
///
/// Returns a [`KestrelError`](crate::KestrelError) if sending fails.
pub async fn send_sell(write: &mut WsWriter, request: &SellRequest) -> Result<()> {
    let contract_id = request.sell;
    send_json(write, request).await?;
    info!(contract_id, "Sent sell");

    Ok(())
}

/// Sends a keep-alive ping.
///
/// # Errors
///
/// Returns a [`KestrelError`](crate::KestrelError) if sending fails.
pub async fn ping(write: &mut WsWriter) -> Result<()> {
    send_json(write, &PingRequest::new()).await?;
    debug!("Sent ping");

    Ok(())
}

/// Drains the outbound-request channel onto the socket.
///
/// Runs until the channel closes (runner dropped) or a send fails; either
/// way the writer task simply ends and the read side will surface the
/// disconnect.
pub async fn run_writer(
    mut write: WsWriter,
    mut requests: tokio::sync::mpsc::UnboundedReceiver<crate::runner::OutboundRequest>,
) -> Result<()> {
    use crate::runner::OutboundRequest;

    while let Some(request) = requests.recv().await {
        match request {
            OutboundRequest::FetchCandles {
                symbol,
                granularity,
                count,
            } => request_candles(&mut write, &symbol, granularity, count).await?,
            OutboundRequest::SubscribeTicks { symbol } => {
                subscribe_ticks(&mut write, &symbol).await?
            }
            OutboundRequest::Proposal(proposal) => send_proposal(&mut write, &proposal).await?,
            OutboundRequest::Buy { proposal_id, price } => {
                send_buy(&mut write, &proposal_id, price).await?
            }
            OutboundRequest::Sell(sell) => send_sell(&mut write, &sell).await?,
            OutboundRequest::Ping => ping(&mut write).await?,
        }
    }

    Ok(())
}
