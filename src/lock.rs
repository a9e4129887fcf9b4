//! Contract lock state machine.
//!
//! The whole system may hold at most one contract open or pending purchase
//! at any time. This module is the single authority on that invariant: the
//! session asks it before requesting a trade, advances it on purchase and
//! settlement events, and lets it self-clear when a lock has gone stale.
//!
//! State transitions:
//!
//! ```text
//! Unlocked -> PurchasePending -> Locked(contract_id) -> Unlocked
//!      ^            |  (purchase error)                    ^
//!      +------------+------ timeout / disconnect ----------+
//! ```

use std::time::{Duration, Instant};

use tracing::{info, warn};

/// A locked or pending lock is force-released after this long without a
/// settlement.
pub const MAX_LOCK_DURATION: Duration = Duration::from_secs(900);

/// Where the lock currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Free to request a new contract.
    Unlocked,
    /// A purchase has been requested but not yet confirmed.
    PurchasePending,
    /// A contract is open and must settle before the next trade.
    Locked { contract_id: u64 },
}

/// Single-flight guard around the proposal/buy/settle lifecycle.
#[derive(Debug)]
pub struct ContractLock {
    state: LockState,
    /// When the current pending/locked phase began.
    since: Option<Instant>,
    max_lock_duration: Duration,
}

impl ContractLock {
    pub fn new() -> Self {
        Self::with_timeout(MAX_LOCK_DURATION)
    }

    /// Lock with a custom staleness timeout (tests use short ones).
    pub fn with_timeout(max_lock_duration: Duration) -> Self {
        Self {
            state: LockState::Unlocked,
            since: None,
            max_lock_duration,
        }
    }

    /// Current state after expiring a stale lock.
    pub fn state(&mut self) -> LockState {
        self.expire_if_stale();
        self.state
    }

    /// True when a contract is open or a purchase is in flight.
    ///
    /// Checking also releases a lock that has outlived the timeout, so a
    /// lost settlement can never block trading forever.
    pub fn is_engaged(&mut self) -> bool {
        self.expire_if_stale();
        self.state != LockState::Unlocked
    }

    /// Claims the lock for a new purchase.
    ///
    /// Returns false (and changes nothing) when a contract is already
    /// open or pending.
    pub fn begin_purchase(&mut self) -> bool {
        if self.is_engaged() {
            return false;
        }
        self.state = LockState::PurchasePending;
        self.since = Some(Instant::now());
        info!("Contract lock engaged - purchase pending");
        true
    }

    /// A purchase was confirmed: locks onto the contract id.
    pub fn confirm_purchase(&mut self, contract_id: u64) {
        if self.state == LockState::Unlocked {
            warn!(
                contract_id,
                "Purchase confirmation arrived without a pending lock"
            );
        }
        self.state = LockState::Locked { contract_id };
        self.since = Some(Instant::now());
        info!(contract_id, "Contract lock engaged");
    }

    /// The purchase failed before confirmation: releases a pending claim.
    ///
    /// A confirmed contract stays locked; only settlement, timeout or
    /// disconnect may release it.
    pub fn abort_purchase(&mut self) {
        if self.state == LockState::PurchasePending {
            self.release("purchase aborted");
        }
    }

    /// A settlement arrived for `contract_id`.
    ///
    /// Releases the lock only when the id matches the locked contract.
    /// Returns false for an unknown or mismatched id, which the caller
    /// logs and ignores; an unrelated settlement must never unlock an
    /// active contract.
    pub fn settle(&mut self, contract_id: u64) -> bool {
        match self.state {
            LockState::Locked { contract_id: held } if held == contract_id => {
                self.release("contract settled");
                true
            }
            _ => {
                warn!(
                    contract_id,
                    state = ?self.state,
                    "Settlement for a contract that is not locked - ignoring"
                );
                false
            }
        }
    }

    /// The transport dropped: in-flight contract state is unknown and must
    /// not block future trading.
    pub fn on_disconnect(&mut self) {
        if self.state != LockState::Unlocked {
            self.release("connection lost");
        }
    }

    /// Operator override.
    pub fn force_unlock(&mut self) {
        if self.state != LockState::Unlocked {
            self.release("manual unlock");
        } else {
            self.since = None;
        }
    }

    fn expire_if_stale(&mut self) {
        if self.state == LockState::Unlocked {
            return;
        }
        if let Some(since) = self.since {
            if since.elapsed() > self.max_lock_duration {
                warn!(state = ?self.state, "Contract lock timeout - force releasing");
                self.release("lock timeout");
            }
        }
    }

    fn release(&mut self, cause: &str) {
        info!(cause, "Contract lock released - ready for next trade");
        self.state = LockState::Unlocked;
        self.since = None;
    }
}

impl Default for ContractLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unlocked() {
        let mut lock = ContractLock::new();
        assert!(!lock.is_engaged());
        assert_eq!(lock.state(), LockState::Unlocked);
    }

    #[test]
    fn full_lifecycle() {
        let mut lock = ContractLock::new();
        assert!(lock.begin_purchase());
        assert_eq!(lock.state(), LockState::PurchasePending);

        lock.confirm_purchase(42);
        assert_eq!(lock.state(), LockState::Locked { contract_id: 42 });

        assert!(lock.settle(42));
        assert_eq!(lock.state(), LockState::Unlocked);
    }

    #[test]
    fn second_purchase_is_refused_while_engaged() {
        let mut lock = ContractLock::new();
        assert!(lock.begin_purchase());
        assert!(!lock.begin_purchase());

        lock.confirm_purchase(7);
        assert!(!lock.begin_purchase());

        // Interleaved unrelated settlements must not free the slot.
        assert!(!lock.settle(8));
        assert!(!lock.begin_purchase());

        assert!(lock.settle(7));
        assert!(lock.begin_purchase());
    }

    #[test]
    fn unknown_settlement_does_not_corrupt_state() {
        let mut lock = ContractLock::new();
        lock.begin_purchase();
        lock.confirm_purchase(1);

        assert!(!lock.settle(999));
        assert_eq!(lock.state(), LockState::Locked { contract_id: 1 });
    }

    #[test]
    fn settlement_while_unlocked_is_ignored() {
        let mut lock = ContractLock::new();
        assert!(!lock.settle(5));
        assert_eq!(lock.state(), LockState::Unlocked);
    }

    #[test]
    fn abort_releases_pending_but_not_locked() {
        let mut lock = ContractLock::new();
        lock.begin_purchase();
        lock.abort_purchase();
        assert_eq!(lock.state(), LockState::Unlocked);

        lock.begin_purchase();
        lock.confirm_purchase(3);
        lock.abort_purchase();
        assert_eq!(lock.state(), LockState::Locked { contract_id: 3 });
    }

    #[test]
    fn stale_lock_self_clears() {
        let mut lock = ContractLock::with_timeout(Duration::from_millis(10));
        lock.begin_purchase();
        lock.confirm_purchase(11);
        std::thread::sleep(Duration::from_millis(20));

        // The next query notices the stale lock and releases it.
        assert!(!lock.is_engaged());
        assert_eq!(lock.state(), LockState::Unlocked);
    }

    #[test]
    fn stale_pending_purchase_self_clears() {
        let mut lock = ContractLock::with_timeout(Duration::from_millis(10));
        lock.begin_purchase();
        std::thread::sleep(Duration::from_millis(20));
        assert!(!lock.is_engaged());
    }

    #[test]
    fn disconnect_releases_any_state() {
        let mut lock = ContractLock::new();
        lock.begin_purchase();
        lock.confirm_purchase(9);
        lock.on_disconnect();
        assert_eq!(lock.state(), LockState::Unlocked);

        lock.begin_purchase();
        lock.on_disconnect();
        assert_eq!(lock.state(), LockState::Unlocked);
    }

    #[test]
    fn force_unlock_overrides() {
        let mut lock = ContractLock::new();
        lock.begin_purchase();
        lock.confirm_purchase(13);
        lock.force_unlock();
        assert!(!lock.is_engaged());
    }
}
