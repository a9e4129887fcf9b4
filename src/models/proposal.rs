//! Contract proposal request/response models.
//!
//! A proposal is a priced offer for a contract; the client requests one,
//! receives an ask price and payout, and may then buy against the
//! proposal id.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a binary contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractType {
    /// Pays out when the spot finishes above the entry.
    #[serde(rename = "CALL")]
    Call,
    /// Pays out when the spot finishes below the entry.
    #[serde(rename = "PUT")]
    Put,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::Call => "CALL",
            ContractType::Put => "PUT",
        }
    }
}

/// Requests a priced proposal for a contract.
#[derive(Debug, Serialize)]
pub struct ProposalRequest {
    pub proposal: u8,
    pub amount: Decimal,
    pub basis: String,
    pub contract_type: ContractType,
    pub currency: String,
    pub duration: u32,
    pub duration_unit: String,
    pub symbol: String,
    pub subscribe: u8,
}

impl ProposalRequest {
    /// Builds a stake-basis USD proposal with a duration in seconds.
    pub fn new(
        symbol: &str,
        contract_type: ContractType,
        amount: Decimal,
        duration_secs: u32,
    ) -> Self {
        Self {
            proposal: 1,
            amount,
            basis: "stake".to_string(),
            contract_type,
            currency: "USD".to_string(),
            duration: duration_secs,
            duration_unit: "s".to_string(),
            symbol: symbol.to_string(),
            subscribe: 1,
        }
    }
}

/// A priced offer returned by the broker.
#[derive(Debug, Clone, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub ask_price: Decimal,
    pub payout: Decimal,
}

/// Envelope for a `proposal` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ProposalResponse {
    pub proposal: Proposal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn proposal_request_serializes_wire_shape() {
        let req = ProposalRequest::new("R_100", ContractType::Call, dec!(1), 300);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["proposal"], 1);
        assert_eq!(json["contract_type"], "CALL");
        assert_eq!(json["basis"], "stake");
        assert_eq!(json["currency"], "USD");
        assert_eq!(json["duration"], 300);
        assert_eq!(json["duration_unit"], "s");
        assert_eq!(json["subscribe"], 1);
    }

    #[test]
    fn proposal_response_deserializes() {
        let response: ProposalResponse = serde_json::from_str(
            r#"{"proposal": {"id": "abc-123", "ask_price": "1.00", "payout": "1.95"}}"#,
        )
        .unwrap();
        assert_eq!(response.proposal.id, "abc-123");
        assert_eq!(response.proposal.ask_price, dec!(1.00));
        assert_eq!(response.proposal.payout, dec!(1.95));
    }
}
