//! SQLite schema definition.

/// Complete database schema for the clinic intake store.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Clients
-- ============================================================================

-- The record column holds the full client document; the other columns are
-- copies used for lookups and ordering.
CREATE TABLE IF NOT EXISTS clients (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    email TEXT,
    phone TEXT,
    closed_date TEXT,
    closed_from_workflow TEXT,
    record TEXT NOT NULL,                         -- JSON object
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_clients_status ON clients(status);
CREATE INDEX IF NOT EXISTS idx_clients_closed_date ON clients(closed_date);
CREATE INDEX IF NOT EXISTS idx_clients_email ON clients(email);

-- ============================================================================
-- Evaluation Criteria
-- ============================================================================

CREATE TABLE IF NOT EXISTS evaluation_criteria (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    field TEXT NOT NULL,
    operator TEXT NOT NULL,
    value TEXT NOT NULL DEFAULT '',
    action TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_by TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_criteria_priority ON evaluation_criteria(priority);

-- ============================================================================
-- Outreach Attempts
-- ============================================================================

-- No foreign key to clients: the spreadsheet backend cannot enforce one and
-- both backends must accept the same writes.
CREATE TABLE IF NOT EXISTS outreach_attempts (
    id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL,
    attempt_number INTEGER NOT NULL CHECK (attempt_number >= 1),
    attempt_type TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    scheduled_date TEXT,
    sent_date TEXT,
    email_subject TEXT,
    email_body TEXT,
    email_message_id TEXT,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (client_id, attempt_number)
);

CREATE INDEX IF NOT EXISTS idx_outreach_client ON outreach_attempts(client_id);

-- ============================================================================
-- Referral Clinics
-- ============================================================================

CREATE TABLE IF NOT EXISTS referral_clinics (
    id TEXT PRIMARY KEY,
    practice_name TEXT NOT NULL,
    contact_name TEXT,
    email TEXT,
    phone TEXT,
    address TEXT,
    website TEXT,
    specialties TEXT NOT NULL DEFAULT '[]',       -- JSON array of strings
    accepted_insurance TEXT NOT NULL DEFAULT '[]', -- JSON array of strings
    notes TEXT,
    custom_fields TEXT NOT NULL DEFAULT '{}',     -- JSON object of strings
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- ============================================================================
-- Email Templates
-- ============================================================================

CREATE TABLE IF NOT EXISTS email_templates (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    subject TEXT NOT NULL,
    body TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    updated_by TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- ============================================================================
-- Settings
-- ============================================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    updated_by TEXT
);

-- ============================================================================
-- Audit Log (append-only, hash chained)
-- ============================================================================

CREATE TABLE IF NOT EXISTS audit_log (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    timestamp TEXT NOT NULL,
    actor_id TEXT NOT NULL,
    actor_email TEXT,
    action TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    previous_value TEXT,                          -- JSON
    new_value TEXT,                               -- JSON
    previous_hash TEXT,
    entry_hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_log(entity_type, entity_id);

CREATE TRIGGER IF NOT EXISTS audit_log_no_update BEFORE UPDATE ON audit_log BEGIN
    SELECT RAISE(ABORT, 'audit log is append-only');
END;

CREATE TRIGGER IF NOT EXISTS audit_log_no_delete BEFORE DELETE ON audit_log BEGIN
    SELECT RAISE(ABORT, 'audit log is append-only');
END;
"#;
