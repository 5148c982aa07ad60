use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProofStatus {
    Pending,
    Verified,
    Rejected,
}

/// A customer's bank-transfer receipt for an order. Only an admin decision
/// mutates it after submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentProof {
    pub id: String,
    pub order_id: String,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
    pub transfer_amount: i64,
    /// ISO date (YYYY-MM-DD) as written on the receipt
    pub transfer_date: String,
    /// Opaque file storage reference
    pub image_ref: String,
    pub notes: Option<String>,
    pub status: ProofStatus,
    pub verified_by: Option<String>,
    pub verified_at: Option<i64>,
    pub rejection_reason: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitPaymentProof {
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
    pub transfer_amount: i64,
    pub transfer_date: String,
    #[serde(default)]
    pub notes: Option<String>,
}
