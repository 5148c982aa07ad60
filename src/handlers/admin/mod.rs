mod licenses;
mod orders;
mod products;

pub use licenses::*;
pub use orders::*;
pub use products::*;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::db::AppState;
use crate::middleware::admin_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // Payment review
        .route("/admin/orders", get(list_orders_for_review))
        .route("/admin/orders/sweep", post(sweep_lapsed_orders))
        .route("/admin/orders/{order_number}", get(get_order_detail))
        .route("/admin/orders/{order_number}/approve", post(approve_order))
        .route("/admin/orders/{order_number}/reject", post(reject_order))
        .route(
            "/admin/payment-proofs/{proof_id}/image",
            get(get_payment_proof_image),
        )
        // Catalog
        .route("/admin/products", post(create_product).get(list_all_products))
        .route("/admin/products/{id}", put(update_product))
        // License overrides
        .route("/admin/licenses/{license_key}/suspend", post(suspend_license))
        .route(
            "/admin/licenses/{license_key}/reinstate",
            post(reinstate_license),
        )
        .layer(middleware::from_fn_with_state(state, admin_auth))
}
