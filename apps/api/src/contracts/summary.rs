use serde::Serialize;

use crate::models::contract::ContractAnalysis;

/// Dashboard headline numbers for one owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractSummary {
    pub total_contracts: usize,
    pub average_score: f64,
    /// Contracts with at least one high-severity risk.
    pub high_risk_contracts: usize,
}

pub fn summarize(contracts: &[ContractAnalysis]) -> ContractSummary {
    let total_contracts = contracts.len();
    let average_score = if total_contracts == 0 {
        0.0
    } else {
        contracts.iter().map(|c| c.overall_score).sum::<f64>() / total_contracts as f64
    };
    let high_risk_contracts = contracts.iter().filter(|c| c.is_high_risk()).count();

    ContractSummary {
        total_contracts,
        average_score,
        high_risk_contracts,
    }
}
