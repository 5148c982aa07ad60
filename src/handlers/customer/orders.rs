use axum::extract::{Extension, State};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::Deserialize;

use crate::db::{AppState, queries, retry_read};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::lifecycle::{checkout, payment};
use crate::middleware::UserContext;
use crate::models::{
    CreateOrder, Order, OrderEvent, OrderWithLines, PaymentProof, SubmitPaymentProof,
};
use crate::storage::MAX_IMAGE_BYTES;

pub async fn create_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Json(input): Json<CreateOrder>,
) -> Result<Json<OrderWithLines>> {
    let mut conn = state.db.get()?;
    let order = checkout::create_order(
        &mut conn,
        ctx.user_id(),
        &input,
        &state.settings,
        queries::now(),
    )?;
    Ok(Json(order))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
) -> Result<Json<Vec<Order>>> {
    let conn = state.db.get()?;
    let orders = retry_read(|| queries::list_orders_for_user(&conn, ctx.user_id()))?;
    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(order_number): Path<String>,
) -> Result<Json<OrderWithLines>> {
    let conn = state.db.get()?;
    let now = queries::now();
    let order =
        retry_read(|| checkout::get_order(&conn, &order_number, Some(ctx.user_id()), now))?;
    Ok(Json(order))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(order_number): Path<String>,
) -> Result<Json<OrderWithLines>> {
    let mut conn = state.db.get()?;
    let order = checkout::cancel_order(&mut conn, ctx.user_id(), &order_number, queries::now())?;
    Ok(Json(order))
}

pub async fn list_order_events(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(order_number): Path<String>,
) -> Result<Json<Vec<OrderEvent>>> {
    let conn = state.db.get()?;
    let order = checkout::find_order(&conn, &order_number, Some(ctx.user_id()))?;
    let events = queries::list_order_events(&conn, &order.id)?;
    Ok(Json(events))
}

#[derive(Debug, Deserialize)]
pub struct SubmitProofRequest {
    #[serde(flatten)]
    pub proof: SubmitPaymentProof,
    /// Receipt image, base64 (a `data:` URL prefix is accepted)
    pub image_base64: String,
}

/// Decode an uploaded image, refusing anything that would exceed the size
/// limit before allocating for it.
pub fn decode_image(encoded: &str) -> Result<Vec<u8>> {
    let encoded = encoded.trim();
    let encoded = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    if encoded.is_empty() {
        return Err(AppError::Validation("Payment proof image is required".into()));
    }
    if encoded.len() / 4 * 3 > MAX_IMAGE_BYTES + 3 {
        return Err(AppError::Validation(format!(
            "Payment proof image exceeds {} MiB",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    BASE64
        .decode(encoded)
        .map_err(|_| AppError::Validation("Payment proof image is not valid base64".into()))
}

pub async fn submit_payment_proof(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(order_number): Path<String>,
    Json(req): Json<SubmitProofRequest>,
) -> Result<Json<PaymentProof>> {
    // Fail fast on orders the caller can't pay before storing anything.
    {
        let conn = state.db.get()?;
        checkout::find_order(&conn, &order_number, Some(ctx.user_id()))?;
    }

    let bytes = decode_image(&req.image_base64)?;
    let image_ref = state.storage.store(&bytes).await?;

    let mut conn = state.db.get()?;
    let proof = payment::submit_proof(
        &mut conn,
        ctx.user_id(),
        &order_number,
        &req.proof,
        &image_ref,
        queries::now(),
    )?;
    Ok(Json(proof))
}

pub async fn list_payment_proofs(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(order_number): Path<String>,
) -> Result<Json<Vec<PaymentProof>>> {
    let conn = state.db.get()?;
    let proofs = retry_read(|| payment::list_proofs(&conn, &order_number, Some(ctx.user_id())))?;
    Ok(Json(proofs))
}
