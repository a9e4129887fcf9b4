//! Single-consumer event loop and the auto-trading timer.
//!
//! All broker events and timer ticks funnel into one mpsc channel and are
//! processed strictly one at a time by [`Runner`], which owns the
//! [`TradingSession`]. Outbound requests go to a separate writer task as
//! fire-and-forget messages, so nothing here ever blocks on the network.
//! The auto-trade timer is an explicit task with a cancellation channel,
//! not an ad hoc handle.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::lock::LockState;
use crate::models::candle::{Candle, Tick};
use crate::models::contract::{BuyConfirmation, OpenContractUpdate, SellConfirmation, SellRequest};
use crate::models::proposal::{Proposal, ProposalRequest};
use crate::session::TradingSession;
use crate::store::Store;

/// Candles requested when (re)building the working window.
const CANDLE_FETCH_COUNT: usize = 200;

/// Everything the runner can receive, from the transport or from timers.
#[derive(Debug)]
pub enum FeedEvent {
    Authorized { balance: f64 },
    CandleSnapshot(Vec<Candle>),
    Tick(Tick),
    Proposal(Proposal),
    PurchaseConfirmed(BuyConfirmation),
    ContractUpdate(OpenContractUpdate),
    SellConfirmed(SellConfirmation),
    ApiError { code: String, message: String },
    Disconnected,
    /// Periodic auto-trading check.
    AutoCheck,
    /// Keep-alive timer fired.
    KeepAlive,
    Shutdown,
}

/// Fire-and-forget requests handed to the writer task.
#[derive(Debug)]
pub enum OutboundRequest {
    FetchCandles {
        symbol: String,
        granularity: u32,
        count: usize,
    },
    SubscribeTicks {
        symbol: String,
    },
    Proposal(ProposalRequest),
    Buy {
        proposal_id: String,
        price: rust_decimal::Decimal,
    },
    Sell(SellRequest),
    Ping,
}

/// A recurring timer feeding one event into the runner channel, with an
/// explicit cancellation handle.
pub struct RecurringTask {
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
}

impl RecurringTask {
    /// Spawns a task that sends `make_event()` every `interval`.
    pub fn start<F>(interval: Duration, tx: mpsc::Sender<FeedEvent>, make_event: F) -> Self
    where
        F: Fn() -> FeedEvent + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so the feed has a
            // chance to deliver candles first.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if tx.send(make_event()).await.is_err() {
                            break;
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });
        Self {
            handle,
            stop: stop_tx,
        }
    }

    /// Cancels the timer. Does not affect an already-locked contract.
    pub fn cancel(&self) {
        let _ = self.stop.send(true);
    }

    /// Cancels and waits for the task to finish.
    pub async fn shutdown(self) {
        self.cancel();
        let _ = self.handle.await;
    }
}

/// Owns the session and processes the event stream one event at a time.
pub struct Runner {
    session: TradingSession,
    outbound: mpsc::UnboundedSender<OutboundRequest>,
    store: Option<Store>,
}

impl Runner {
    pub fn new(
        session: TradingSession,
        outbound: mpsc::UnboundedSender<OutboundRequest>,
        store: Option<Store>,
    ) -> Self {
        Self {
            session,
            outbound,
            store,
        }
    }

    /// Consumes events until the channel closes, a disconnect arrives or
    /// shutdown is requested. Returns the session so the caller can
    /// persist or reconnect with it.
    pub async fn run(mut self, mut events: mpsc::Receiver<FeedEvent>) -> TradingSession {
        while let Some(event) = events.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }
        self.persist();
        self.session
    }

    /// Processes one event; returns false when the loop should stop.
    fn handle_event(&mut self, event: FeedEvent) -> bool {
        match event {
            FeedEvent::Authorized { balance } => {
                self.session.on_authorized(balance);
                // Build the working window and start streaming.
                self.send(OutboundRequest::FetchCandles {
                    symbol: self.session.settings.symbol.clone(),
                    granularity: self.session.settings.granularity,
                    count: CANDLE_FETCH_COUNT,
                });
                self.send(OutboundRequest::SubscribeTicks {
                    symbol: self.session.settings.symbol.clone(),
                });
            }
            FeedEvent::CandleSnapshot(candles) => self.session.on_candle_snapshot(candles),
            FeedEvent::Tick(tick) => self.session.on_tick(tick),
            FeedEvent::Proposal(proposal) => {
                // Only buy a proposal we are actually waiting for.
                if self.session.lock_state() == LockState::PurchasePending {
                    info!(
                        proposal_id = %proposal.id,
                        ask_price = %proposal.ask_price,
                        payout = %proposal.payout,
                        "Proposal received - buying"
                    );
                    self.send(OutboundRequest::Buy {
                        proposal_id: proposal.id,
                        price: proposal.ask_price,
                    });
                } else {
                    warn!(proposal_id = %proposal.id, "Unsolicited proposal - skipping purchase");
                }
            }
            FeedEvent::PurchaseConfirmed(buy) => {
                self.session
                    .on_purchase_confirmed(buy.contract_id, buy.buy_price, Utc::now());
                self.persist();
            }
            FeedEvent::ContractUpdate(update) => {
                let sell = self.session.on_contract_update(
                    update.contract_id,
                    update.status,
                    update.profit,
                    update.bid_price,
                );
                if let Some(sell) = sell {
                    self.send(OutboundRequest::Sell(sell));
                }
                if update.status.is_settled() {
                    self.persist();
                }
            }
            FeedEvent::SellConfirmed(sell) => {
                info!(transaction_id = sell.transaction_id, sold_for = %sell.sold_for, "Contract sold");
            }
            FeedEvent::ApiError { code, message } => {
                self.session.on_error(&format!("{code}: {message}"));
            }
            FeedEvent::Disconnected => {
                self.session.on_disconnect();
                return false;
            }
            FeedEvent::AutoCheck => {
                if let Some(proposal) = self.session.auto_check(Utc::now()) {
                    self.send(OutboundRequest::Proposal(proposal));
                } else {
                    self.persist();
                }
            }
            FeedEvent::KeepAlive => self.send(OutboundRequest::Ping),
            FeedEvent::Shutdown => {
                info!("Shutdown requested");
                return false;
            }
        }
        true
    }

    fn send(&self, request: OutboundRequest) {
        if self.outbound.send(request).is_err() {
            warn!("Writer task is gone - dropping outbound request");
        }
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        match store.save(&self.session.to_store()) {
            Ok(()) => debug!(path = %store.path().display(), "Session persisted"),
            Err(e) => warn!(error = %e, "Failed to persist session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TradeSettings;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rust_decimal_macros::dec;

    fn candle(close: f64, epoch: i64) -> Candle {
        Candle {
            open: close * 0.999,
            high: close * 1.002,
            low: close * 0.997,
            close,
            epoch,
            volume: Some(1.0),
        }
    }

    fn uptrend(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| candle(100.0 * 1.001f64.powi(i as i32), i as i64 * 60))
            .collect()
    }

    fn live_runner() -> (Runner, mpsc::UnboundedReceiver<OutboundRequest>) {
        let settings = TradeSettings {
            live_mode: true,
            ..TradeSettings::default()
        };
        let session = TradingSession::with_rng(settings, StdRng::seed_from_u64(7));
        let (tx, rx) = mpsc::unbounded_channel();
        (Runner::new(session, tx, None), rx)
    }

    #[tokio::test]
    async fn authorized_fetches_candles_and_subscribes() {
        let (mut runner, mut outbound) = live_runner();
        assert!(runner.handle_event(FeedEvent::Authorized { balance: 1000.0 }));

        match outbound.recv().await.unwrap() {
            OutboundRequest::FetchCandles { symbol, count, .. } => {
                assert_eq!(symbol, "R_100");
                assert_eq!(count, CANDLE_FETCH_COUNT);
            }
            other => panic!("unexpected request {other:?}"),
        }
        assert!(matches!(
            outbound.recv().await.unwrap(),
            OutboundRequest::SubscribeTicks { .. }
        ));
    }

    #[tokio::test]
    async fn unsolicited_proposal_is_not_bought() {
        let (mut runner, mut outbound) = live_runner();
        runner.handle_event(FeedEvent::Proposal(Proposal {
            id: "p-1".to_string(),
            ask_price: dec!(1),
            payout: dec!(1.95),
        }));
        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_stops_the_loop_and_unlocks() {
        let (mut runner, _outbound) = live_runner();
        runner.handle_event(FeedEvent::CandleSnapshot(uptrend(60)));
        assert!(!runner.handle_event(FeedEvent::Disconnected));
        assert_eq!(runner.session.lock_state(), LockState::Unlocked);
    }

    #[tokio::test]
    async fn settlement_with_profit_threshold_sends_sell() {
        let (mut runner, mut outbound) = live_runner();
        runner.handle_event(FeedEvent::CandleSnapshot(uptrend(60)));

        // Arrange a locked contract by hand.
        let now = Utc::now();
        let mut decision = runner.session.run_decision_cycle(now);
        decision.action = crate::engine::decision::Action::Buy;
        decision.confidence = 0.8;
        runner.session.request_trade(&decision, now).unwrap();
        runner.handle_event(FeedEvent::PurchaseConfirmed(BuyConfirmation {
            contract_id: 44,
            buy_price: dec!(1),
            purchase_time: 0,
        }));

        runner.handle_event(FeedEvent::ContractUpdate(OpenContractUpdate {
            contract_id: 44,
            status: crate::models::contract::ContractStatus::Open,
            profit: dec!(0.75),
            bid_price: dec!(1.75),
        }));
        assert!(matches!(
            outbound.try_recv().unwrap(),
            OutboundRequest::Sell(sell) if sell.sell == 44
        ));
    }

    #[tokio::test]
    async fn recurring_task_fires_and_cancels() {
        let (tx, mut rx) = mpsc::channel(8);
        let task = RecurringTask::start(Duration::from_millis(5), tx, || FeedEvent::AutoCheck);

        assert!(matches!(rx.recv().await, Some(FeedEvent::AutoCheck)));
        task.shutdown().await;

        // Drain anything queued before cancellation; the channel must then
        // stay silent.
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn keep_alive_sends_ping() {
        let (mut runner, mut outbound) = live_runner();
        runner.handle_event(FeedEvent::KeepAlive);
        assert!(matches!(
            outbound.try_recv().unwrap(),
            OutboundRequest::Ping
        ));
    }
}
