use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::{LicenseActivation, LicenseDuration, LicenseType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LicenseStatus {
    Pending,
    Active,
    /// Never stored; derived from `expires_at` at read time
    Expired,
    /// Set only by an admin override
    Suspended,
}

/// Activation ceiling of a license. Stored as a nullable column where NULL
/// means unlimited, so quota checks never compare against a made-up cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<i32>", into = "Option<i32>")]
pub enum ActivationLimit {
    Limited(i32),
    Unlimited,
}

impl ActivationLimit {
    pub fn allows(self, activated_count: i32) -> bool {
        match self {
            ActivationLimit::Limited(max) => activated_count < max,
            ActivationLimit::Unlimited => true,
        }
    }

    /// Remaining activations, None when unlimited.
    pub fn remaining(self, activated_count: i32) -> Option<i32> {
        match self {
            ActivationLimit::Limited(max) => Some((max - activated_count).max(0)),
            ActivationLimit::Unlimited => None,
        }
    }

    pub fn as_column(self) -> Option<i32> {
        self.into()
    }
}

impl From<Option<i32>> for ActivationLimit {
    fn from(value: Option<i32>) -> Self {
        match value {
            Some(max) => ActivationLimit::Limited(max),
            None => ActivationLimit::Unlimited,
        }
    }
}

impl From<ActivationLimit> for Option<i32> {
    fn from(value: ActivationLimit) -> Self {
        match value {
            ActivationLimit::Limited(max) => Some(max),
            ActivationLimit::Unlimited => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    pub license_key: String,
    /// Originating order. Display-only; deleting the order never touches the license.
    pub order_id: String,
    pub order_line_id: String,
    pub product_id: String,
    pub user_id: String,
    pub license_type: LicenseType,
    pub license_duration: LicenseDuration,
    pub max_activations: ActivationLimit,
    pub activated_count: i32,
    /// Stored status. Use [`License::effective_status`] for anything user-facing.
    pub status: LicenseStatus,
    pub activated_at: Option<i64>,
    /// None for lifetime licenses
    pub expires_at: Option<i64>,
    pub created_at: i64,
}

impl License {
    pub fn effective_status(&self, now: i64) -> LicenseStatus {
        effective_status(self.status, self.expires_at, now)
    }
}

/// Derive the status a license has at `now`. Only an active license can lapse
/// into `expired`; suspension always wins.
pub fn effective_status(stored: LicenseStatus, expires_at: Option<i64>, now: i64) -> LicenseStatus {
    match (stored, expires_at) {
        (LicenseStatus::Active, Some(exp)) if now > exp => LicenseStatus::Expired,
        (status, _) => status,
    }
}

/// Public view returned by the status query.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseStatusView {
    pub license_key: String,
    pub status: LicenseStatus,
    pub activated_count: i32,
    pub max_activations: ActivationLimit,
    pub remaining_activations: Option<i32>,
    pub expires_at: Option<i64>,
    pub activations: Vec<LicenseActivation>,
}

/// License as listed to its owner, with the lazily derived status filled in.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseWithStatus {
    #[serde(flatten)]
    pub license: License,
    pub effective_status: LicenseStatus,
}
