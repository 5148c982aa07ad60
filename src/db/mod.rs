mod from_row;
pub mod queries;

pub use from_row::{FromRow, query_all, query_one};

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::error::Result;
use crate::lifecycle::CheckoutSettings;
use crate::notify::Notifier;
use crate::storage::FileStorage;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub settings: CheckoutSettings,
    pub notifier: Arc<dyn Notifier>,
    pub storage: FileStorage,
}

/// Per-connection pragmas. The busy timeout makes concurrent IMMEDIATE
/// transactions queue for the write lock instead of failing outright.
const CONNECTION_PRAGMAS: &str = "
    PRAGMA foreign_keys = ON;
    PRAGMA busy_timeout = 5000;
";

pub fn create_pool(database_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|c| c.execute_batch(CONNECTION_PRAGMAS));
    let pool = Pool::builder().max_size(8).build(manager)?;
    {
        let conn = pool.get()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        init_db(&conn)?;
    }
    Ok(pool)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Run an idempotent read, retrying once if SQLite reports lock contention.
pub fn retry_read<T>(mut read: impl FnMut() -> Result<T>) -> Result<T> {
    match read() {
        Err(e) if e.is_busy() => {
            tracing::debug!("Read hit a locked database, retrying once");
            read()
        }
        other => other,
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    role TEXT NOT NULL,
    api_key_hash TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    base_price INTEGER NOT NULL CHECK (base_price >= 0),
    sale_price INTEGER CHECK (sale_price IS NULL OR sale_price >= 0),
    active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS cart_lines (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    product_id TEXT NOT NULL REFERENCES products(id),
    license_type TEXT NOT NULL,
    license_duration TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity BETWEEN 1 AND 10),
    unit_price INTEGER NOT NULL,
    added_at INTEGER NOT NULL,
    UNIQUE (user_id, product_id, license_type, license_duration)
);
CREATE INDEX IF NOT EXISTS idx_cart_lines_user ON cart_lines(user_id);

CREATE TABLE IF NOT EXISTS orders (
    id TEXT PRIMARY KEY,
    order_number TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    subtotal INTEGER NOT NULL,
    tax INTEGER NOT NULL,
    discount INTEGER NOT NULL DEFAULT 0,
    total_amount INTEGER NOT NULL,
    status TEXT NOT NULL,
    payment_status TEXT NOT NULL,
    payment_deadline INTEGER NOT NULL,
    idempotency_key TEXT NOT NULL,
    billing TEXT NOT NULL,
    current_proof_id TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    CHECK (total_amount = subtotal + tax - discount),
    UNIQUE (user_id, idempotency_key)
);
CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_orders_payment ON orders(payment_status, payment_deadline);

CREATE TABLE IF NOT EXISTS order_lines (
    id TEXT PRIMARY KEY,
    order_id TEXT NOT NULL REFERENCES orders(id),
    position INTEGER NOT NULL,
    product_id TEXT NOT NULL,
    product_name TEXT NOT NULL,
    license_type TEXT NOT NULL,
    license_duration TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity BETWEEN 1 AND 10),
    unit_price INTEGER NOT NULL,
    line_total INTEGER NOT NULL,
    UNIQUE (order_id, position)
);

CREATE TABLE IF NOT EXISTS order_events (
    id TEXT PRIMARY KEY,
    order_id TEXT NOT NULL REFERENCES orders(id),
    from_status TEXT,
    to_status TEXT NOT NULL,
    payment_status TEXT NOT NULL,
    actor TEXT,
    note TEXT,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_order_events_order ON order_events(order_id);

CREATE TABLE IF NOT EXISTS payment_proofs (
    id TEXT PRIMARY KEY,
    order_id TEXT NOT NULL REFERENCES orders(id),
    bank_name TEXT NOT NULL,
    account_number TEXT NOT NULL,
    account_name TEXT NOT NULL,
    transfer_amount INTEGER NOT NULL,
    transfer_date TEXT NOT NULL,
    image_ref TEXT NOT NULL,
    notes TEXT,
    status TEXT NOT NULL,
    verified_by TEXT,
    verified_at INTEGER,
    rejection_reason TEXT,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_payment_proofs_order ON payment_proofs(order_id);

-- No foreign key to orders: a license outlives its originating order.
CREATE TABLE IF NOT EXISTS licenses (
    id TEXT PRIMARY KEY,
    license_key TEXT NOT NULL UNIQUE,
    order_id TEXT NOT NULL,
    order_line_id TEXT NOT NULL UNIQUE,
    product_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    license_type TEXT NOT NULL,
    license_duration TEXT NOT NULL,
    max_activations INTEGER,
    activated_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    activated_at INTEGER,
    expires_at INTEGER,
    created_at INTEGER NOT NULL,
    CHECK (activated_count >= 0),
    CHECK (max_activations IS NULL OR activated_count <= max_activations)
);
CREATE INDEX IF NOT EXISTS idx_licenses_user ON licenses(user_id);
CREATE INDEX IF NOT EXISTS idx_licenses_order ON licenses(order_id);

CREATE TABLE IF NOT EXISTS license_activations (
    id TEXT PRIMARY KEY,
    license_id TEXT NOT NULL REFERENCES licenses(id),
    domain TEXT NOT NULL,
    journal_path TEXT NOT NULL DEFAULT '',
    ip_address TEXT,
    product_version TEXT,
    activated_at INTEGER NOT NULL,
    last_check_at INTEGER NOT NULL,
    UNIQUE (license_id, domain, journal_path)
);
";
