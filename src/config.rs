use std::env;

use crate::lifecycle::CheckoutSettings;

const DEFAULT_PAYMENT_WINDOW_HOURS: i64 = 72;
/// One year.
const MAX_PAYMENT_WINDOW_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Directory for payment-proof images
    pub storage_dir: String,
    pub bootstrap_admin_email: Option<String>,
    /// Flat tax in basis points (11% = 1100)
    pub tax_basis_points: i64,
    pub payment_window_hours: i64,
    pub order_number_prefix: String,
    /// Where order/license notifications are POSTed (None = log only)
    pub notify_webhook_url: Option<String>,
    /// HMAC key for signing notification payloads
    pub notify_webhook_secret: Option<String>,
    /// Interval for the lapsed-deadline sweep (0 = disabled)
    pub deadline_sweep_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let tax_basis_points = tax_from_env(env::var("TAX_PERCENTAGE").ok().as_deref());
        let payment_window_hours =
            payment_window_from_env(env::var("PAYMENT_WINDOW_HOURS").ok().as_deref());

        let deadline_sweep_secs: u64 = env::var("DEADLINE_SWEEP_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "storefront.db".to_string()),
            storage_dir: env::var("STORAGE_DIR").unwrap_or_else(|_| "uploads".to_string()),
            bootstrap_admin_email: env::var("BOOTSTRAP_ADMIN_EMAIL").ok(),
            tax_basis_points,
            payment_window_hours,
            order_number_prefix: env::var("ORDER_NUMBER_PREFIX")
                .unwrap_or_else(|_| "ORD".to_string()),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok().filter(|v| !v.is_empty()),
            notify_webhook_secret: env::var("NOTIFY_WEBHOOK_SECRET")
                .ok()
                .filter(|v| !v.is_empty()),
            deadline_sweep_secs,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            tax_basis_points: self.tax_basis_points,
            payment_window_secs: self.payment_window_hours.saturating_mul(3600),
            order_number_prefix: self.order_number_prefix.clone(),
        }
    }
}

fn tax_from_env(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else { return 0 };
    match parse_percentage_basis_points(raw) {
        Some(bp) => bp,
        None => {
            tracing::warn!(value = raw, "Ignoring malformed TAX_PERCENTAGE, charging no tax");
            0
        }
    }
}

fn payment_window_from_env(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return DEFAULT_PAYMENT_WINDOW_HOURS;
    };
    match raw.trim().parse::<i64>() {
        Ok(hours) if (1..=MAX_PAYMENT_WINDOW_HOURS).contains(&hours) => hours,
        _ => {
            tracing::warn!(
                value = raw,
                max = MAX_PAYMENT_WINDOW_HOURS,
                default = DEFAULT_PAYMENT_WINDOW_HOURS,
                "Ignoring out-of-range PAYMENT_WINDOW_HOURS"
            );
            DEFAULT_PAYMENT_WINDOW_HOURS
        }
    }
}

/// Parse a decimal percentage ("11", "2.5", "7.25") into basis points.
/// Anything beyond two decimal places is rejected rather than rounded.
pub fn parse_percentage_basis_points(value: &str) -> Option<i64> {
    let value = value.trim().trim_end_matches('%');
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.is_empty() || frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let frac: i64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<2}", frac).parse().ok()?
    };
    let bp = whole.checked_mul(100)?.checked_add(frac)?;
    (0..=10_000).contains(&bp).then_some(bp)
}
