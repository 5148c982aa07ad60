use axum::extract::State;

use crate::db::{AppState, queries, retry_read};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::models::Product;

pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let conn = state.db.get()?;
    let products = retry_read(|| queries::list_products(&conn, true))?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>> {
    let conn = state.db.get()?;
    let product = retry_read(|| queries::get_product_by_id(&conn, &id))?
        .filter(|p| p.active)
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;
    Ok(Json(product))
}
