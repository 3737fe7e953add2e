//! Axum route handlers for the Contracts API.

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        rejection::QueryRejection,
        Multipart, Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use bytes::{Bytes, BytesMut};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::contracts::detector::Detection;
use crate::contracts::pipeline::{
    analyze_upload, contract_summary, delete_contract, detect_type, get_contract, list_contracts,
    Upload,
};
use crate::contracts::summary::ContractSummary;
use crate::errors::AppError;
use crate::models::contract::{ContractAnalysis, ContractType};
use crate::state::AppState;

/// Multipart field carrying the PDF.
pub const FILE_FIELD: &str = "contract";
/// Optional multipart field carrying the user-confirmed type.
pub const TYPE_FIELD: &str = "contractType";
const DEFAULT_FILE_NAME: &str = "contract.pdf";
const MAX_FILE_NAME_CHARS: usize = 255;

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /contracts/detect-type
pub async fn handle_detect_type(
    State(state): State<AppState>,
    _auth: AuthUser,
    multipart: Multipart,
) -> Result<Json<Detection>, AppError> {
    let upload = read_upload(multipart, state.config.max_upload_bytes).await?;
    let detection = detect_type(&state, upload.bytes).await?;
    Ok(Json(detection))
}

/// POST /contracts/analyze
///
/// Runs the full pipeline. The optional `contractType` field is the type the
/// user confirmed after detect-type; without it the detected type is used.
pub async fn handle_analyze(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ContractAnalysis>), AppError> {
    let upload = read_upload(multipart, state.config.max_upload_bytes).await?;
    let analysis = analyze_upload(&state, auth.user.id, upload).await?;
    Ok((StatusCode::CREATED, Json(analysis)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

/// GET /contracts/user-contracts?limit=N
///
/// Without `limit` every contract of the caller is returned.
pub async fn handle_user_contracts(
    State(state): State<AppState>,
    auth: AuthUser,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<ContractAnalysis>>, AppError> {
    let limit = parse_limit(params)?;
    Ok(Json(list_contracts(&state, auth.user.id, limit).await?))
}

/// GET /contracts/contract/:id
pub async fn handle_get_contract(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ContractAnalysis>, AppError> {
    let id = parse_contract_id(&id)?;
    Ok(Json(get_contract(&state, id, auth.user.id).await?))
}

/// DELETE /contracts/contract/:id
pub async fn handle_delete_contract(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_contract_id(&id)?;
    delete_contract(&state, id, auth.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /contracts/summary
pub async fn handle_summary(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ContractSummary>, AppError> {
    Ok(Json(contract_summary(&state, auth.user.id).await?))
}

// ────────────────────────────────────────────────────────────────────────────
// Form parsing
// ────────────────────────────────────────────────────────────────────────────

fn parse_contract_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::Validation(format!("Invalid contract ID '{raw}'")))
}

fn parse_limit(params: Result<Query<ListParams>, QueryRejection>) -> Result<Option<i64>, AppError> {
    let Query(params) =
        params.map_err(|e| AppError::Validation(format!("Invalid query: {}", e.body_text())))?;
    match params.limit {
        Some(limit) if limit < 1 => Err(AppError::Validation(
            "limit must be a positive integer".to_string(),
        )),
        limit => Ok(limit),
    }
}

async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> Result<Upload, AppError> {
    let mut file: Option<(Bytes, String)> = None;
    let mut confirmed_type = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(FILE_FIELD) => {
                let file_name = sanitize_file_name(field.file_name());
                let bytes = read_limited(field, max_bytes).await?;
                file = Some((bytes, file_name));
            }
            Some(TYPE_FIELD) => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, max_bytes))?;
                if !raw.trim().is_empty() {
                    let parsed = raw.parse::<ContractType>().map_err(AppError::Validation)?;
                    confirmed_type = Some(parsed);
                }
            }
            _ => {}
        }
    }

    let (bytes, file_name) = file
        .ok_or_else(|| AppError::Validation(format!("Missing '{FILE_FIELD}' file field")))?;

    Ok(Upload {
        bytes,
        file_name,
        confirmed_type,
    })
}

/// Buffers a field, bailing out as soon as it grows past `max_bytes`.
async fn read_limited(mut field: Field<'_>, max_bytes: usize) -> Result<Bytes, AppError> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if buffer.len() + chunk.len() > max_bytes {
            return Err(AppError::FileTooLarge { limit: max_bytes });
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

fn multipart_error(e: MultipartError, max_bytes: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::FileTooLarge { limit: max_bytes }
    } else {
        AppError::Validation(format!("Malformed multipart body: {}", e.body_text()))
    }
}

/// Keeps the last path component, trimmed and bounded.
fn sanitize_file_name(raw: Option<&str>) -> String {
    let name = raw
        .and_then(|n| n.rsplit(['/', '\\']).next())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_FILE_NAME);
    name.chars().take(MAX_FILE_NAME_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_contract_id_rejects_garbage() {
        assert!(matches!(
            parse_contract_id("not-a-uuid").unwrap_err(),
            AppError::Validation(_)
        ));
        let id = Uuid::new_v4();
        assert_eq!(parse_contract_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_parse_limit_requires_positive_value() {
        let params = |limit| Ok(Query(ListParams { limit }));
        assert_eq!(parse_limit(params(None)).unwrap(), None);
        assert_eq!(parse_limit(params(Some(5))).unwrap(), Some(5));
        assert!(matches!(
            parse_limit(params(Some(0))).unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn test_sanitize_file_name_strips_paths() {
        assert_eq!(sanitize_file_name(Some("../../etc/lease.pdf")), "lease.pdf");
        assert_eq!(sanitize_file_name(Some("C:\\docs\\nda.pdf")), "nda.pdf");
        assert_eq!(sanitize_file_name(Some("   ")), DEFAULT_FILE_NAME);
        assert_eq!(sanitize_file_name(None), DEFAULT_FILE_NAME);
    }

    #[test]
    fn test_sanitize_file_name_bounds_length() {
        let long = "a".repeat(1000);
        assert_eq!(sanitize_file_name(Some(&long)).len(), MAX_FILE_NAME_CHARS);
    }
}
