mod cart;
mod licenses;
mod orders;

pub use cart::*;
pub use licenses::*;
pub use orders::*;

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

use crate::db::AppState;
use crate::middleware::customer_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/lines", post(add_cart_line))
        .route(
            "/cart/lines/{line_id}",
            patch(update_cart_line).delete(remove_cart_line),
        )
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/{order_number}", get(get_order))
        .route("/orders/{order_number}/cancel", post(cancel_order))
        .route("/orders/{order_number}/events", get(list_order_events))
        .route(
            "/orders/{order_number}/payment-proof",
            post(submit_payment_proof),
        )
        .route(
            "/orders/{order_number}/payment-proofs",
            get(list_payment_proofs),
        )
        .route("/licenses", get(list_my_licenses))
        .layer(middleware::from_fn_with_state(state, customer_auth))
}
