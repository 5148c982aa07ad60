use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::lifecycle::activation;
use crate::models::LicenseStatusView;

pub async fn suspend_license(
    State(state): State<AppState>,
    Path(license_key): Path<String>,
) -> Result<Json<LicenseStatusView>> {
    let mut conn = state.db.get()?;
    let view = activation::suspend_license(&mut conn, &license_key, queries::now())?;
    Ok(Json(view))
}

pub async fn reinstate_license(
    State(state): State<AppState>,
    Path(license_key): Path<String>,
) -> Result<Json<LicenseStatusView>> {
    let mut conn = state.db.get()?;
    let view = activation::reinstate_license(&mut conn, &license_key, queries::now())?;
    Ok(Json(view))
}
