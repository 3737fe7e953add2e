//! Contract pipeline: intake → detection → confirmation → analysis → persistence.
//!
//! A record is written only once every step has succeeded, and the insert is
//! the last step. The file upload, the insert and the compensating file delete
//! run together in their own task: a request dropped mid-persist (deadline,
//! client disconnect) still ends with either both the file and the record or
//! neither.

use bytes::Bytes;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::contracts::analyzer::run_analysis;
use crate::contracts::detector::Detection;
use crate::contracts::files::{storage_key, PDF_CONTENT_TYPE};
use crate::contracts::intake;
use crate::contracts::store::ensure_owner;
use crate::contracts::summary::{summarize, ContractSummary};
use crate::errors::AppError;
use crate::models::contract::{ContractAnalysis, ContractType, NewAnalysis};
use crate::state::AppState;

/// Progress of one analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStatus {
    Uploaded,
    Detecting,
    AwaitingConfirmation,
    Analyzing,
    Complete,
    Failed { code: &'static str },
}

impl AnalysisStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Complete | AnalysisStatus::Failed { .. })
    }

    pub fn can_advance_to(&self, next: &AnalysisStatus) -> bool {
        use AnalysisStatus::*;
        match (self, next) {
            (Uploaded, Detecting)
            | (Detecting, AwaitingConfirmation)
            | (AwaitingConfirmation, Analyzing)
            | (Analyzing, Complete) => true,
            (current, Failed { .. }) => !current.is_terminal(),
            _ => false,
        }
    }
}

/// Tracks a single request through [`AnalysisStatus`].
#[derive(Debug)]
pub struct AnalysisRun {
    pub id: Uuid,
    status: AnalysisStatus,
}

impl AnalysisRun {
    pub fn new(id: Uuid) -> Self {
        debug!("Contract {id}: {:?}", AnalysisStatus::Uploaded);
        Self {
            id,
            status: AnalysisStatus::Uploaded,
        }
    }

    pub fn status(&self) -> AnalysisStatus {
        self.status
    }

    pub fn advance(&mut self, next: AnalysisStatus) -> Result<(), AppError> {
        if !self.status.can_advance_to(&next) {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Illegal status transition {:?} -> {:?} for contract {}",
                self.status,
                next,
                self.id
            )));
        }
        debug!("Contract {}: {:?} -> {:?}", self.id, self.status, next);
        self.status = next;
        Ok(())
    }

    fn fail(&mut self, err: &AppError) {
        let from = self.status();
        if self.advance(AnalysisStatus::Failed { code: err.code() }).is_ok() {
            warn!("Contract {} failed while {:?}: {err}", self.id, from);
        }
    }
}

/// A multipart upload after form parsing.
#[derive(Debug)]
pub struct Upload {
    pub bytes: Bytes,
    pub file_name: String,
    /// Type confirmed by the user; overrides the detector when present.
    pub confirmed_type: Option<ContractType>,
}

pub async fn detect_type(state: &AppState, bytes: Bytes) -> Result<Detection, AppError> {
    let document = intake::accept(bytes, state.config.max_upload_bytes).await?;
    let detection = state.detector.detect(&document.text);
    info!(
        "Detected {} contract (confidence {:.2})",
        detection.contract_type, detection.confidence
    );
    Ok(detection)
}

pub async fn analyze_upload(
    state: &AppState,
    owner_id: Uuid,
    upload: Upload,
) -> Result<ContractAnalysis, AppError> {
    let mut run = AnalysisRun::new(Uuid::new_v4());
    match run_pipeline(state, owner_id, upload, &mut run).await {
        Ok(analysis) => Ok(analysis),
        Err(e) => {
            run.fail(&e);
            Err(e)
        }
    }
}

async fn run_pipeline(
    state: &AppState,
    owner_id: Uuid,
    upload: Upload,
    run: &mut AnalysisRun,
) -> Result<ContractAnalysis, AppError> {
    let Upload {
        bytes,
        file_name,
        confirmed_type,
    } = upload;

    let document = intake::accept(bytes, state.config.max_upload_bytes).await?;

    run.advance(AnalysisStatus::Detecting)?;
    let detection = state.detector.detect(&document.text);

    run.advance(AnalysisStatus::AwaitingConfirmation)?;
    let contract_type = match confirmed_type {
        Some(confirmed) => {
            if confirmed != detection.contract_type {
                info!(
                    "Contract {}: user confirmed {} over detected {}",
                    run.id, confirmed, detection.contract_type
                );
            }
            confirmed
        }
        None => detection.contract_type,
    };

    run.advance(AnalysisStatus::Analyzing)?;
    let assessment = run_analysis(
        state.engine.as_ref(),
        &document.text,
        contract_type,
        state.config.analysis_timeout,
    )
    .await?;

    let analysis = ContractAnalysis::new(NewAnalysis {
        id: run.id,
        owner_id,
        contract_type,
        assessment,
        file_name,
        storage_key: storage_key(owner_id, run.id),
    });

    let analysis = tokio::spawn(persist(state.clone(), analysis, document.bytes))
        .await
        .map_err(|e| {
            AppError::Internal(anyhow::anyhow!(
                "Persist task for contract {} aborted: {e}",
                run.id
            ))
        })??;

    run.advance(AnalysisStatus::Complete)?;

    info!(
        "Contract {} analyzed: {} risks, score {:.1}",
        analysis.id,
        analysis.risks.len(),
        analysis.overall_score
    );
    Ok(analysis)
}

/// Uploads the file, inserts the record, and removes the file again if the
/// insert fails. Owns its inputs so it can outlive the request.
async fn persist(
    state: AppState,
    analysis: ContractAnalysis,
    bytes: Bytes,
) -> Result<ContractAnalysis, AppError> {
    let key = analysis.storage_key.as_str();
    state.files.put(key, bytes, PDF_CONTENT_TYPE).await?;

    if let Err(e) = state.contracts.create(&analysis).await {
        if let Err(cleanup) = state.files.delete(key).await {
            warn!("Orphaned upload {key} after failed insert: {cleanup}");
        }
        return Err(e);
    }

    soft(
        state.cache.invalidate(analysis.owner_id, None).await,
        "invalidate",
    );
    Ok(analysis)
}

/// Newest first. Only the unlimited list is cached; a limited request is
/// served from it when present.
pub async fn list_contracts(
    state: &AppState,
    owner_id: Uuid,
    limit: Option<i64>,
) -> Result<Vec<ContractAnalysis>, AppError> {
    // Read before the query so a concurrent mutation makes our write stale.
    let generation = soft(state.cache.list_generation(owner_id).await, "read");

    if let Some(generation) = generation {
        let cached = soft(state.cache.get_list(owner_id, generation).await, "read").flatten();
        if let Some(mut cached) = cached {
            if let Some(limit) = limit {
                cached.truncate(usize::try_from(limit).unwrap_or(0));
            }
            return Ok(cached);
        }
    }

    let contracts = state.contracts.list_by_owner(owner_id, limit).await?;
    if let (Some(generation), None) = (generation, limit) {
        soft(
            state.cache.put_list(owner_id, generation, &contracts).await,
            "write",
        );
    }
    Ok(contracts)
}

pub async fn get_contract(
    state: &AppState,
    id: Uuid,
    owner_id: Uuid,
) -> Result<ContractAnalysis, AppError> {
    if let Some(cached) = soft(state.cache.get_item(id).await, "read").flatten() {
        ensure_owner(&cached, owner_id)?;
        return Ok(cached);
    }

    let contract = state.contracts.get_by_id(id, owner_id).await?;
    soft(state.cache.put_item(&contract).await, "write");
    Ok(contract)
}

/// Deletes the record, then its cached copies, then the stored file. Once the
/// record is gone the delete has happened; a failed file delete only leaves an
/// orphan to log.
pub async fn delete_contract(state: &AppState, id: Uuid, owner_id: Uuid) -> Result<(), AppError> {
    let removed = state.contracts.delete(id, owner_id).await?;
    soft(state.cache.invalidate(owner_id, Some(id)).await, "invalidate");
    if let Err(e) = state.files.delete(&removed.storage_key).await {
        warn!(
            "Orphaned upload {} after deleting contract {id}: {e}",
            removed.storage_key
        );
    }
    Ok(())
}

pub async fn contract_summary(
    state: &AppState,
    owner_id: Uuid,
) -> Result<ContractSummary, AppError> {
    let contracts = list_contracts(state, owner_id, None).await?;
    Ok(summarize(&contracts))
}

/// Cache failures degrade to misses.
fn soft<T>(result: Result<T, AppError>, op: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Contract cache {op} failed: {e}");
            None
        }
    }
}
