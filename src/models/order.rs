use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::{LicenseDuration, LicenseType};

/// Fulfilment state of an order.
///
/// ```text
/// pending -> awaiting_verification -> processing -> completed
///                 |       ^
///                 v       |
///          payment_rejected          (any non-terminal) -> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    AwaitingVerification,
    Processing,
    Completed,
    PaymentRejected,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

/// Payment state, narrower than [`OrderStatus`]. `rejected` loops back to
/// `pending_verification` on resubmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    PendingVerification,
    Paid,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub country: String,
    pub address: String,
    pub city: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub user_id: String,
    pub subtotal: i64,
    pub tax: i64,
    pub discount: i64,
    /// Frozen at creation: `subtotal + tax - discount`
    pub total_amount: i64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_deadline: i64,
    #[serde(skip_serializing)]
    pub idempotency_key: String,
    pub billing: BillingInfo,
    /// Most recently submitted payment proof
    pub current_proof_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// An unpaid order past its deadline. Evaluated at read time; nothing
    /// writes this state.
    pub fn is_payment_expired(&self, now: i64) -> bool {
        self.payment_status == PaymentStatus::Unpaid
            && !self.status.is_terminal()
            && now > self.payment_deadline
    }
}

/// Copied from the cart at checkout; later catalog changes never touch it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub position: i32,
    pub product_id: String,
    pub product_name: String,
    pub license_type: LicenseType,
    pub license_duration: LicenseDuration,
    pub quantity: i32,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithLines {
    #[serde(flatten)]
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub payment_expired: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    pub idempotency_key: String,
    pub billing: BillingInfo,
}

/// One row of an order's status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub id: String,
    pub order_id: String,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// User id of whoever caused the transition (None = system)
    pub actor: Option<String>,
    pub note: Option<String>,
    pub created_at: i64,
}
