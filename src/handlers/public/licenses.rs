use axum::{extract::State, http::HeaderMap};
use serde::Deserialize;

use crate::db::{AppState, queries, retry_read};
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::lifecycle::activation::{self, ActivationOutcome};
use crate::models::{ActivationMetadata, LicenseStatusView};
use crate::util::extract_client_ip;

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub license_key: String,
    pub domain: String,
    #[serde(default)]
    pub journal_path: Option<String>,
    #[serde(default)]
    pub product_version: Option<String>,
}

/// Called by installed plugins on first run and periodically afterwards.
pub async fn activate_license(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ActivateRequest>,
) -> Result<Json<ActivationOutcome>> {
    let metadata = ActivationMetadata {
        ip_address: extract_client_ip(&headers),
        product_version: req.product_version,
    };

    let mut conn = state.db.get()?;
    let outcome = activation::activate(
        &mut conn,
        &req.license_key,
        &req.domain,
        req.journal_path.as_deref(),
        &metadata,
        queries::now(),
    )?;
    Ok(Json(outcome))
}

pub async fn license_status(
    State(state): State<AppState>,
    Path(license_key): Path<String>,
) -> Result<Json<LicenseStatusView>> {
    let conn = state.db.get()?;
    let now = queries::now();
    let view = retry_read(|| activation::license_status(&conn, &license_key, now))?;
    Ok(Json(view))
}
