use serde::{Deserialize, Deserializer, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

/// Catalog entry. Prices are in minor units (cents).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub base_price: i64,
    /// Overrides `base_price` for pricing when set
    pub sale_price: Option<i64>,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub base_price: i64,
    #[serde(default)]
    pub sale_price: Option<i64>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl CreateProduct {
    pub fn validate(&self) -> Result<(), String> {
        validate_name(&self.name)?;
        validate_prices(Some(self.base_price), self.sale_price)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub base_price: Option<i64>,
    /// Absent leaves the sale price alone, `null` clears it
    #[serde(default, deserialize_with = "double_option")]
    pub sale_price: Option<Option<i64>>,
    pub active: Option<bool>,
}

impl UpdateProduct {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        validate_prices(self.base_price, self.sale_price.flatten())
    }
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Product name is required".into());
    }
    Ok(())
}

/// Largest list or sale price in cents. Keeps every line total and order
/// total well inside `i64`.
pub const MAX_PRICE: i64 = 1_000_000_000_000;

fn validate_prices(base_price: Option<i64>, sale_price: Option<i64>) -> Result<(), String> {
    if base_price.is_some_and(|p| p < 0) || sale_price.is_some_and(|p| p < 0) {
        return Err("Prices cannot be negative".into());
    }
    if base_price.is_some_and(|p| p > MAX_PRICE) || sale_price.is_some_and(|p| p > MAX_PRICE) {
        return Err(format!("Prices cannot exceed {} cents", MAX_PRICE));
    }
    Ok(())
}

/// Where and how many installs a license covers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LicenseType {
    SingleSite,
    SingleJournal,
    MultiSite,
    MultiJournal,
    Unlimited,
}

/// How long a license stays valid after issuance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
pub enum LicenseDuration {
    #[serde(rename = "1-year")]
    #[strum(serialize = "1-year")]
    OneYear,
    #[serde(rename = "2-years")]
    #[strum(serialize = "2-years")]
    TwoYears,
    #[serde(rename = "lifetime")]
    #[strum(serialize = "lifetime")]
    Lifetime,
}
