//! Contract purchase, update and sell models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Buys a previously received proposal.
#[derive(Debug, Serialize)]
pub struct BuyRequest {
    /// Proposal id to buy against.
    pub buy: String,
    /// Maximum acceptable price.
    pub price: Decimal,
    pub subscribe: u8,
}

impl BuyRequest {
    pub fn new(proposal_id: &str, price: Decimal) -> Self {
        Self {
            buy: proposal_id.to_string(),
            price,
            subscribe: 1,
        }
    }
}

/// Confirmation of a successful purchase.
#[derive(Debug, Clone, Deserialize)]
pub struct BuyConfirmation {
    pub contract_id: u64,
    pub buy_price: Decimal,
    #[serde(default)]
    pub purchase_time: i64,
}

/// Envelope for a `buy` response.
#[derive(Debug, Clone, Deserialize)]
pub struct BuyResponse {
    pub buy: BuyConfirmation,
}

/// Lifecycle status of a purchased contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Open,
    Won,
    Lost,
    Sold,
}

impl ContractStatus {
    /// True once the contract can never change value again.
    pub fn is_settled(&self) -> bool {
        !matches!(self, ContractStatus::Open)
    }
}

/// Streamed state of an open (or just-settled) contract.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenContractUpdate {
    pub contract_id: u64,
    pub status: ContractStatus,
    #[serde(default)]
    pub profit: Decimal,
    #[serde(default)]
    pub bid_price: Decimal,
}

/// Envelope for a `proposal_open_contract` update.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenContractResponse {
    pub proposal_open_contract: OpenContractUpdate,
}

/// Sells an open contract back to the broker at the current bid.
#[derive(Debug, Serialize)]
pub struct SellRequest {
    pub sell: u64,
    pub price: Decimal,
}

impl SellRequest {
    pub fn new(contract_id: u64, price: Decimal) -> Self {
        Self {
            sell: contract_id,
            price,
        }
    }
}

/// Confirmation of a sell-back.
#[derive(Debug, Clone, Deserialize)]
pub struct SellConfirmation {
    pub sold_for: Decimal,
    pub transaction_id: u64,
}

/// Envelope for a `sell` response.
#[derive(Debug, Clone, Deserialize)]
pub struct SellResponse {
    pub sell: SellConfirmation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn buy_response_deserializes() {
        let response: BuyResponse = serde_json::from_str(
            r#"{"buy": {"contract_id": 991, "buy_price": "1.00", "purchase_time": 1700000000}}"#,
        )
        .unwrap();
        assert_eq!(response.buy.contract_id, 991);
        assert_eq!(response.buy.buy_price, dec!(1.00));
    }

    #[test]
    fn open_contract_update_deserializes_statuses() {
        for (raw, expected) in [
            ("open", ContractStatus::Open),
            ("won", ContractStatus::Won),
            ("lost", ContractStatus::Lost),
            ("sold", ContractStatus::Sold),
        ] {
            let json = format!(
                r#"{{"proposal_open_contract": {{"contract_id": 5, "status": "{raw}", "profit": "0.25", "bid_price": "1.10"}}}}"#
            );
            let response: OpenContractResponse = serde_json::from_str(&json).unwrap();
            assert_eq!(response.proposal_open_contract.status, expected);
        }
        assert!(ContractStatus::Won.is_settled());
        assert!(!ContractStatus::Open.is_settled());
    }

    #[test]
    fn sell_request_serializes() {
        let req = SellRequest::new(991, dec!(1.10));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["sell"], 991);
    }
}
