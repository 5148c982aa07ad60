use axum::extract::{Extension, State};

use crate::db::{AppState, queries, retry_read};
use crate::error::Result;
use crate::extractors::Json;
use crate::lifecycle::activation;
use crate::middleware::UserContext;
use crate::models::LicenseWithStatus;

pub async fn list_my_licenses(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
) -> Result<Json<Vec<LicenseWithStatus>>> {
    let conn = state.db.get()?;
    let now = queries::now();
    let licenses = retry_read(|| activation::licenses_for_user(&conn, ctx.user_id(), now))?;
    Ok(Json(licenses))
}
