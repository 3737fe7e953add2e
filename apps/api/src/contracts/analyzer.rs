//! Analyzer — turns contract text and a confirmed type into an [`Assessment`].
//!
//! The engine only labels risks. The overall score is derived locally by
//! [`score_from_risks`](crate::models::contract::score_from_risks), so score and
//! risks can never disagree.
//!
//! Variance: the LLM engine runs at temperature 0, which keeps severity labels
//! stable across repeated runs in practice. A relabelled clause moves the score
//! by at most 16 points (high ↔ low); the score itself adds no randomness.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::contracts::prompts::{build_analysis_prompt, ANALYSIS_SYSTEM};
use crate::errors::AppError;
use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, JSON_ONLY_SYSTEM};
use crate::llm_client::{LlmClient, LlmError};
use crate::models::contract::{Assessment, ContractType, Risk, Severity};

/// Upper bound on contract characters sent to the engine.
const MAX_PROMPT_CHARS: usize = 60_000;

#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    async fn assess(&self, text: &str, contract_type: ContractType)
        -> Result<Assessment, AppError>;
}

/// Engine backed by the shared [`LlmClient`].
pub struct LlmAnalysisEngine(pub LlmClient);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAssessment {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    risks: Vec<RawRisk>,
    #[serde(default)]
    recommendations: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRisk {
    #[serde(alias = "clause_reference", alias = "clause")]
    clause_reference: String,
    severity: String,
    #[serde(alias = "explanation")]
    description: String,
}

#[async_trait]
impl AnalysisEngine for LlmAnalysisEngine {
    async fn assess(
        &self,
        text: &str,
        contract_type: ContractType,
    ) -> Result<Assessment, AppError> {
        let prompt = build_analysis_prompt(contract_type, truncate_chars(text, MAX_PROMPT_CHARS));
        let system = format!("{ANALYSIS_SYSTEM} {JSON_ONLY_SYSTEM} {GROUNDING_INSTRUCTION}");

        let raw: RawAssessment = self
            .0
            .call_json(&prompt, &system)
            .await
            .map_err(map_llm_error)?;

        into_assessment(raw)
    }
}

fn map_llm_error(e: LlmError) -> AppError {
    if e.is_timeout() {
        AppError::AnalysisTimeout
    } else {
        AppError::AnalysisService(format!("Contract analysis failed: {e}"))
    }
}

fn into_assessment(raw: RawAssessment) -> Result<Assessment, AppError> {
    let risks = raw
        .risks
        .into_iter()
        .map(|r| {
            Ok(Risk {
                severity: parse_severity(&r.severity)?,
                clause_reference: r.clause_reference.trim().to_string(),
                description: r.description.trim().to_string(),
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(Assessment {
        summary: raw.summary.trim().to_string(),
        risks,
        recommendations: raw
            .recommendations
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect(),
    })
}

fn parse_severity(raw: &str) -> Result<Severity, AppError> {
    match raw.trim().to_lowercase().as_str() {
        "low" => Ok(Severity::Low),
        "medium" => Ok(Severity::Medium),
        "high" => Ok(Severity::High),
        other => Err(AppError::AnalysisService(format!(
            "Engine returned unknown severity '{other}'"
        ))),
    }
}

/// Truncates to at most `max` characters on a char boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Runs the engine under the configured deadline.
pub async fn run_analysis(
    engine: &dyn AnalysisEngine,
    text: &str,
    contract_type: ContractType,
    timeout: Duration,
) -> Result<Assessment, AppError> {
    match tokio::time::timeout(timeout, engine.assess(text, contract_type)).await {
        Ok(Ok(assessment)) => {
            info!(
                "Analysis produced {} risks for {} contract",
                assessment.risks.len(),
                contract_type
            );
            Ok(assessment)
        }
        Ok(Err(e)) => Err(e),
        Err(_) => {
            warn!("Analysis exceeded {}s deadline", timeout.as_secs());
            Err(AppError::AnalysisTimeout)
        }
    }
}
