use serde::{Deserialize, Serialize};

/// One install of a licensed product. Each row holds one unit of quota; a
/// repeated activation from the same site only refreshes `last_check_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseActivation {
    pub id: String,
    pub license_id: String,
    pub domain: String,
    pub journal_path: Option<String>,
    pub ip_address: Option<String>,
    pub product_version: Option<String>,
    pub activated_at: i64,
    pub last_check_at: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivationMetadata {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub product_version: Option<String>,
}
