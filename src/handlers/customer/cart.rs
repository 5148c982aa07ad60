use axum::extract::{Extension, State};

use crate::db::{AppState, retry_read, queries};
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::lifecycle::cart;
use crate::middleware::UserContext;
use crate::models::{AddCartLine, CartSnapshot, UpdateCartLine};

pub async fn get_cart(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
) -> Result<Json<CartSnapshot>> {
    let conn = state.db.get()?;
    let snapshot = retry_read(|| cart::cart_snapshot(&conn, ctx.user_id()))?;
    Ok(Json(snapshot))
}

pub async fn add_cart_line(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Json(input): Json<AddCartLine>,
) -> Result<Json<CartSnapshot>> {
    let mut conn = state.db.get()?;
    let snapshot = cart::add_to_cart(&mut conn, ctx.user_id(), &input, queries::now())?;
    Ok(Json(snapshot))
}

pub async fn update_cart_line(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(line_id): Path<String>,
    Json(changes): Json<UpdateCartLine>,
) -> Result<Json<CartSnapshot>> {
    let mut conn = state.db.get()?;
    let snapshot = cart::update_cart_line(&mut conn, ctx.user_id(), &line_id, &changes)?;
    Ok(Json(snapshot))
}

pub async fn remove_cart_line(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(line_id): Path<String>,
) -> Result<Json<CartSnapshot>> {
    let mut conn = state.db.get()?;
    let snapshot = cart::remove_cart_line(&mut conn, ctx.user_id(), &line_id)?;
    Ok(Json(snapshot))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
) -> Result<Json<CartSnapshot>> {
    let conn = state.db.get()?;
    let snapshot = cart::clear_cart(&conn, ctx.user_id())?;
    Ok(Json(snapshot))
}
