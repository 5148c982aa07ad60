use axum::{
    extract::{Extension, State},
    http::header,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries, retry_read};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::lifecycle::{checkout, deadline, verification};
use crate::middleware::UserContext;
use crate::models::{License, Order, OrderEvent, OrderWithLines, PaymentProof, PaymentStatus};

#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    /// Defaults to the verification queue
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

pub async fn list_orders_for_review(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> Result<Json<Vec<Order>>> {
    let conn = state.db.get()?;
    let orders = match query.payment_status {
        None | Some(PaymentStatus::PendingVerification) => {
            retry_read(|| verification::review_queue(&conn))?
        }
        Some(status) => retry_read(|| queries::list_orders_by_payment_status(&conn, status))?,
    };
    Ok(Json(orders))
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: OrderWithLines,
    pub payment_proofs: Vec<PaymentProof>,
    pub events: Vec<OrderEvent>,
    pub licenses: Vec<License>,
}

pub async fn get_order_detail(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Json<OrderDetail>> {
    let conn = state.db.get()?;
    let order = checkout::get_order(&conn, &order_number, None, queries::now())?;
    let order_id = order.order.id.clone();
    Ok(Json(OrderDetail {
        order,
        payment_proofs: queries::list_payment_proofs_for_order(&conn, &order_id)?,
        events: queries::list_order_events(&conn, &order_id)?,
        licenses: queries::list_licenses_for_order(&conn, &order_id)?,
    }))
}

pub async fn approve_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(order_number): Path<String>,
) -> Result<Json<verification::ApprovalOutcome>> {
    let mut conn = state.db.get()?;
    let outcome = verification::approve_order(
        &mut conn,
        &order_number,
        ctx.user_id(),
        queries::now(),
        state.notifier.as_ref(),
    )?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

pub async fn reject_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(order_number): Path<String>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<OrderWithLines>> {
    let mut conn = state.db.get()?;
    let order = verification::reject_order(
        &mut conn,
        &order_number,
        ctx.user_id(),
        &req.reason,
        queries::now(),
        state.notifier.as_ref(),
    )?;
    Ok(Json(order))
}

pub async fn get_payment_proof_image(
    State(state): State<AppState>,
    Path(proof_id): Path<String>,
) -> Result<impl IntoResponse> {
    let image_ref = {
        let conn = state.db.get()?;
        queries::get_payment_proof_by_id(&conn, &proof_id)?
            .ok_or_else(|| AppError::NotFound("Payment proof not found".into()))?
            .image_ref
    };
    let (bytes, kind) = state.storage.retrieve(&image_ref).await?;
    Ok(([(header::CONTENT_TYPE, kind.content_type())], bytes))
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub cancelled: Vec<String>,
}

pub async fn sweep_lapsed_orders(State(state): State<AppState>) -> Result<Json<SweepResponse>> {
    let mut conn = state.db.get()?;
    let cancelled =
        deadline::sweep_lapsed_orders(&mut conn, queries::now(), state.notifier.as_ref())?;
    Ok(Json(SweepResponse { cancelled }))
}
