//! SQLite schema definition.

/// Complete database schema for the clinic core.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Service Catalog (local registry)
-- ============================================================================

CREATE TABLE IF NOT EXISTS service_catalog (
    id TEXT PRIMARY KEY,                         -- svc_<base36 millis>_<hex>
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    price REAL NOT NULL DEFAULT 0 CHECK (price >= 0),
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_service_active ON service_catalog(active);

-- ============================================================================
-- Stock Catalog (local registry with quantity on hand)
-- ============================================================================

CREATE TABLE IF NOT EXISTS stock_catalog (
    id TEXT PRIMARY KEY,                         -- stk_<base36 millis>_<hex>
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    price REAL NOT NULL DEFAULT 0 CHECK (price >= 0),
    unit TEXT NOT NULL DEFAULT 'шт',
    qty REAL NOT NULL DEFAULT 0 CHECK (qty >= 0),
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_stock_active ON stock_catalog(active);

-- ============================================================================
-- Discharge overrides (keyed by visit id, local only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS discharges (
    visit_id TEXT PRIMARY KEY,
    complaint TEXT,
    diagnosis TEXT,
    rx TEXT,
    recommendations TEXT,
    follow_up TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Files and visit links
-- ============================================================================

CREATE TABLE IF NOT EXISTS files (
    file_id TEXT PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    stored_name TEXT NOT NULL UNIQUE,
    url TEXT NOT NULL DEFAULT '',
    size INTEGER NOT NULL DEFAULT 0,
    mime_type TEXT NOT NULL DEFAULT '',
    uploaded_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS visit_files (
    visit_id TEXT NOT NULL,
    file_id TEXT NOT NULL REFERENCES files(file_id) ON DELETE CASCADE,
    linked_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (visit_id, file_id)
);

CREATE INDEX IF NOT EXISTS idx_visit_files_visit ON visit_files(visit_id);

-- ============================================================================
-- Server mirrors (owners, patients, visits) as namespaced JSON values
-- ============================================================================

CREATE TABLE IF NOT EXISTS local_cache (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,                         -- JSON document
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
