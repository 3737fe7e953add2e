use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Closed set of contract categories the detector and analyzer understand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractType {
    Employment,
    #[serde(rename = "NDA", alias = "Non-Disclosure Agreement")]
    Nda,
    Sales,
    Lease,
    Services,
    #[default]
    Other,
}

impl ContractType {
    pub const ALL: [ContractType; 6] = [
        ContractType::Employment,
        ContractType::Nda,
        ContractType::Sales,
        ContractType::Lease,
        ContractType::Services,
        ContractType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::Employment => "Employment",
            ContractType::Nda => "NDA",
            ContractType::Sales => "Sales",
            ContractType::Lease => "Lease",
            ContractType::Services => "Services",
            ContractType::Other => "Other",
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "employment" => Ok(ContractType::Employment),
            "nda" | "non-disclosure agreement" | "non disclosure agreement" => {
                Ok(ContractType::Nda)
            }
            "sales" => Ok(ContractType::Sales),
            "lease" => Ok(ContractType::Lease),
            "services" => Ok(ContractType::Services),
            "other" => Ok(ContractType::Other),
            _ => Err(format!("Unknown contract type '{}'", s.trim())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Points deducted from a perfect score for each risk of this severity.
    pub fn penalty(&self) -> f64 {
        match self {
            Severity::Low => 4.0,
            Severity::Medium => 10.0,
            Severity::High => 20.0,
        }
    }
}

/// A flagged clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    pub clause_reference: String,
    pub severity: Severity,
    pub description: String,
}

/// Engine output before it is bound to an owner and a stored file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub summary: String,
    pub risks: Vec<Risk>,
    pub recommendations: Vec<String>,
}

/// Overall score in [0, 100]; higher is safer.
/// 100 minus the severity penalties of every risk, clamped.
pub fn score_from_risks(risks: &[Risk]) -> f64 {
    let penalty: f64 = risks.iter().map(|r| r.severity.penalty()).sum();
    (100.0 - penalty).clamp(0.0, 100.0)
}

/// A completed, persisted contract analysis.
///
/// `overall_score` and `risks` are only ever set together through
/// [`ContractAnalysis::new`], so a record cannot carry one without the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAnalysis {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub contract_type: ContractType,
    pub overall_score: f64,
    pub risks: Vec<Risk>,
    pub recommendations: Vec<String>,
    pub summary: String,
    pub file_name: String,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to build a [`ContractAnalysis`] except the derived score.
pub struct NewAnalysis {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub contract_type: ContractType,
    pub assessment: Assessment,
    pub file_name: String,
    pub storage_key: String,
}

impl ContractAnalysis {
    pub fn new(new: NewAnalysis) -> Self {
        let NewAnalysis {
            id,
            owner_id,
            contract_type,
            assessment,
            file_name,
            storage_key,
        } = new;

        Self {
            id,
            owner_id,
            contract_type,
            overall_score: score_from_risks(&assessment.risks),
            risks: assessment.risks,
            recommendations: assessment.recommendations,
            summary: assessment.summary,
            file_name,
            storage_key,
            created_at: Utc::now(),
        }
    }

    pub fn is_high_risk(&self) -> bool {
        self.risks.iter().any(|r| r.severity == Severity::High)
    }
}

/// Row shape of the `contract_analyses` table.
#[derive(Debug, Clone, FromRow)]
pub struct ContractRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub contract_type: String,
    pub overall_score: f64,
    pub risks: Json<Vec<Risk>>,
    pub recommendations: Json<Vec<String>>,
    pub summary: String,
    pub file_name: String,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ContractRow> for ContractAnalysis {
    type Error = anyhow::Error;

    fn try_from(row: ContractRow) -> Result<Self, Self::Error> {
        let contract_type = row
            .contract_type
            .parse::<ContractType>()
            .map_err(|e| anyhow::anyhow!("Corrupt contract row {}: {e}", row.id))?;

        Ok(ContractAnalysis {
            id: row.id,
            owner_id: row.owner_id,
            contract_type,
            overall_score: row.overall_score,
            risks: row.risks.0,
            recommendations: row.recommendations.0,
            summary: row.summary,
            file_name: row.file_name,
            storage_key: row.storage_key,
            created_at: row.created_at,
        })
    }
}
