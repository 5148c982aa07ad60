//! Shared test fixtures.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde_json::Value;
use tempfile::TempDir;

pub use storefront::db::{AppState, DbPool, create_pool, queries};
pub use storefront::error::AppError;
pub use storefront::lifecycle::CheckoutSettings;
pub use storefront::models::*;
use storefront::lifecycle::{cart, checkout, payment, verification};
use storefront::notify::{NotificationEvent, Notifier};
use storefront::storage::FileStorage;
use storefront::util::SECONDS_PER_DAY;

/// 2026-03-15T12:00:00Z
pub const T0: i64 = 1_773_576_000;
pub const DAY: i64 = SECONDS_PER_DAY;

/// A 1x1 PNG.
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89,
];

/// File-backed database in a temp dir. File-backed (not `:memory:`) so that
/// several pool connections see the same data.
pub struct TestDb {
    pub dir: TempDir,
    pub pool: DbPool,
}

pub fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("storefront-test.db");
    let pool = create_pool(path.to_str().expect("utf-8 path")).expect("pool");
    TestDb { dir, pool }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(String, NotificationEvent, Value)>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(String, NotificationEvent, Value)> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<NotificationEvent> {
        self.events().into_iter().map(|(_, e, _)| e).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, user_id: &str, event: NotificationEvent, payload: Value) {
        self.events
            .lock()
            .unwrap()
            .push((user_id.to_string(), event, payload));
    }
}

pub fn test_settings() -> CheckoutSettings {
    CheckoutSettings {
        tax_basis_points: 1_100,
        payment_window_secs: 3 * DAY,
        order_number_prefix: "ORD".to_string(),
    }
}

pub fn test_state(db: &TestDb, notifier: Arc<RecordingNotifier>) -> AppState {
    AppState {
        db: db.pool.clone(),
        settings: test_settings(),
        notifier,
        storage: FileStorage::new(db.dir.path().join("uploads")),
    }
}

pub fn create_test_user(conn: &Connection, email: &str, role: UserRole) -> (User, String) {
    queries::create_user(
        conn,
        &CreateUser {
            email: email.to_string(),
            name: "Test User".to_string(),
            role,
        },
    )
    .expect("create user")
}

pub fn create_test_product(conn: &Connection, name: &str, base_price: i64) -> Product {
    queries::create_product(
        conn,
        &CreateProduct {
            name: name.to_string(),
            base_price,
            sale_price: None,
            active: true,
        },
    )
    .expect("create product")
}

pub fn billing() -> BillingInfo {
    BillingInfo {
        name: "Ada Lovelace".to_string(),
        email: "ada@example.org".to_string(),
        phone: "+62 812 0000 0000".to_string(),
        country: "ID".to_string(),
        address: "Jl. Merdeka 1".to_string(),
        city: "Jakarta".to_string(),
        company: Some("Journal Press".to_string()),
        postal_code: None,
    }
}

pub fn order_request(key: &str) -> CreateOrder {
    CreateOrder {
        idempotency_key: key.to_string(),
        billing: billing(),
    }
}

pub fn add_line(
    conn: &mut Connection,
    user_id: &str,
    product: &Product,
    license_type: LicenseType,
    license_duration: LicenseDuration,
    quantity: i32,
) -> CartSnapshot {
    cart::add_to_cart(
        conn,
        user_id,
        &AddCartLine {
            product_id: product.id.clone(),
            license_type,
            license_duration,
            quantity,
        },
        T0,
    )
    .expect("add to cart")
}

/// Put one line in the cart and check out at `T0`.
pub fn place_order(
    conn: &mut Connection,
    user_id: &str,
    product: &Product,
    license_type: LicenseType,
    license_duration: LicenseDuration,
    key: &str,
) -> OrderWithLines {
    add_line(conn, user_id, product, license_type, license_duration, 1);
    checkout::create_order(conn, user_id, &order_request(key), &test_settings(), T0)
        .expect("create order")
}

pub fn proof_input(amount: i64) -> SubmitPaymentProof {
    SubmitPaymentProof {
        bank_name: "BCA".to_string(),
        account_number: "1234567890".to_string(),
        account_name: "Ada Lovelace".to_string(),
        transfer_amount: amount,
        transfer_date: "2026-03-15".to_string(),
        notes: None,
    }
}

pub fn submit(conn: &mut Connection, order: &Order, now: i64) -> Result<PaymentProof, AppError> {
    payment::submit_proof(
        conn,
        &order.user_id,
        &order.order_number,
        &proof_input(order.total_amount),
        "0000000000000000000000000000000000000000000000000000000000000000.png",
        now,
    )
}

/// Order through to `completed`, returning its licenses.
pub fn paid_order(
    conn: &mut Connection,
    customer: &User,
    admin: &User,
    product: &Product,
    license_type: LicenseType,
    license_duration: LicenseDuration,
    key: &str,
) -> Vec<License> {
    let order = place_order(conn, &customer.id, product, license_type, license_duration, key);
    submit(conn, &order.order, T0 + 60).expect("submit proof");
    verification::approve_order(
        conn,
        &order.order.order_number,
        &admin.id,
        T0 + 120,
        &RecordingNotifier::default(),
    )
    .expect("approve")
    .licenses
}

// ============ HTTP helpers ============

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;

/// Drive one request through a fresh router and decode the JSON body
/// (`Value::Null` for non-JSON bodies).
pub async fn send(
    state: &AppState,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = storefront::app(state.clone())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Like `send`, but returns the raw body and content type.
pub async fn send_raw(
    state: &AppState,
    uri: &str,
    token: &str,
) -> (StatusCode, Option<String>, Vec<u8>) {
    let request = Request::builder()
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = storefront::app(state.clone())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, bytes.to_vec())
}
