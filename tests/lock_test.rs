//! Contract-lock invariant under realistic event interleavings.
//!
//! The property under test: a second trade request while a contract is
//! open or pending never produces a second outstanding purchase, for any
//! interleaving of settlement and error events.

use std::time::Duration;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rust_decimal_macros::dec;

use kestrel::config::TradeSettings;
use kestrel::engine::decision::{Action, Decision};
use kestrel::lock::{ContractLock, LockState};
use kestrel::models::candle::Candle;
use kestrel::models::contract::ContractStatus;
use kestrel::session::TradingSession;

fn uptrend_candles() -> Vec<Candle> {
    (0..60)
        .map(|i| {
            let close = 100.0 * 1.001f64.powi(i);
            Candle {
                open: close * 0.999,
                high: close * 1.002,
                low: close * 0.997,
                close,
                epoch: i as i64 * 60,
                volume: Some(1.0),
            }
        })
        .collect()
}

fn live_session() -> TradingSession {
    let settings = TradeSettings {
        live_mode: true,
        ..TradeSettings::default()
    };
    let mut session = TradingSession::with_rng(settings, StdRng::seed_from_u64(3));
    session.on_candle_snapshot(uptrend_candles());
    session
}

fn tradeable_decision(session: &mut TradingSession) -> Decision {
    let mut decision = session.run_decision_cycle(Utc::now());
    decision.action = Action::Buy;
    decision.confidence = 0.8;
    decision
}

#[test]
fn one_outstanding_purchase_per_settlement_cycle() {
    let mut session = live_session();
    let decision = tradeable_decision(&mut session);

    let mut outstanding = 0;
    for round in 0..5u64 {
        // Burst of requests: exactly one may go out.
        for _ in 0..4 {
            if session.request_trade(&decision, Utc::now()).is_some() {
                outstanding += 1;
            }
        }
        assert_eq!(outstanding, 1, "round {round}");

        let contract_id = 100 + round;
        session.on_purchase_confirmed(contract_id, dec!(1), Utc::now());

        // More requests while locked, plus settlements for other ids.
        assert!(session.request_trade(&decision, Utc::now()).is_none());
        session.on_contract_update(999_999, ContractStatus::Won, dec!(1), dec!(2));
        assert!(session.request_trade(&decision, Utc::now()).is_none());

        // The matching settlement releases the slot for the next round.
        session.on_contract_update(contract_id, ContractStatus::Lost, dec!(-1), dec!(0));
        assert_eq!(session.lock_state(), LockState::Unlocked);
        outstanding = 0;
    }
}

#[test]
fn error_during_purchase_allows_retry_without_double_booking() {
    let mut session = live_session();
    let decision = tradeable_decision(&mut session);

    assert!(session.request_trade(&decision, Utc::now()).is_some());
    assert!(session.request_trade(&decision, Utc::now()).is_none());

    // The buy failed before confirmation.
    session.on_error("ContractCreationFailure: market closed");
    assert_eq!(session.lock_state(), LockState::Unlocked);

    // Exactly one new request may go out again.
    assert!(session.request_trade(&decision, Utc::now()).is_some());
    assert!(session.request_trade(&decision, Utc::now()).is_none());
}

#[test]
fn late_settlement_for_previous_contract_does_not_unlock_current() {
    let mut session = live_session();
    let decision = tradeable_decision(&mut session);

    session.request_trade(&decision, Utc::now()).unwrap();
    session.on_purchase_confirmed(1, dec!(1), Utc::now());
    session.on_contract_update(1, ContractStatus::Won, dec!(0.8), dec!(1.8));

    session.request_trade(&decision, Utc::now()).unwrap();
    session.on_purchase_confirmed(2, dec!(1), Utc::now());

    // A duplicate (late) settlement for contract 1 arrives while 2 is
    // open; it must not free the lock.
    session.on_contract_update(1, ContractStatus::Won, dec!(0.8), dec!(1.8));
    assert_eq!(session.lock_state(), LockState::Locked { contract_id: 2 });
    assert!(session.request_trade(&decision, Utc::now()).is_none());
}

#[test]
fn lock_timeout_releases_without_settlement() {
    let mut lock = ContractLock::with_timeout(Duration::from_millis(20));
    assert!(lock.begin_purchase());
    lock.confirm_purchase(5);
    assert!(lock.is_engaged());

    std::thread::sleep(Duration::from_millis(40));

    // No settlement ever arrived; the next check self-clears.
    assert!(!lock.is_engaged());
    assert!(lock.begin_purchase());
}

#[test]
fn disconnect_never_leaves_the_session_stuck() {
    let mut session = live_session();
    let decision = tradeable_decision(&mut session);

    session.request_trade(&decision, Utc::now()).unwrap();
    session.on_purchase_confirmed(9, dec!(1), Utc::now());
    session.on_disconnect();

    assert_eq!(session.lock_state(), LockState::Unlocked);
    assert!(session.request_trade(&decision, Utc::now()).is_some());
}
