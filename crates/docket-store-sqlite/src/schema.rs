//! SQL schema for the Docket SQLite store.
//!
//! Executed once at store startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
-- One row per ticket version. A logical ticket is (ticket_category,
-- ticket_number); its current version is the row with is_active = 1.
-- Closed rows are never updated again.
CREATE TABLE IF NOT EXISTS tickets (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket_category     TEXT    NOT NULL,
    ticket_number       TEXT    NOT NULL,
    description         TEXT    NOT NULL,
    completion_criteria TEXT,
    version             INTEGER NOT NULL CHECK (version >= 1),
    valid_from          TEXT    NOT NULL,   -- RFC 3339 UTC, microseconds
    valid_to            TEXT,               -- NULL while current
    is_active           INTEGER NOT NULL DEFAULT 1 CHECK (is_active IN (0, 1)),
    created_at          TEXT    NOT NULL,
    updated_at          TEXT    NOT NULL,
    CHECK ((is_active = 1) = (valid_to IS NULL)),
    CHECK (valid_to IS NULL OR valid_to >= valid_from)
);

-- At most one active version per logical key.
CREATE UNIQUE INDEX IF NOT EXISTS tickets_one_active_idx
    ON tickets(ticket_category, ticket_number)
    WHERE is_active = 1;

CREATE INDEX IF NOT EXISTS tickets_lineage_idx
    ON tickets(ticket_number, ticket_category, version);
CREATE INDEX IF NOT EXISTS tickets_updated_idx ON tickets(updated_at);

-- Checklist rows hang off one ticket version; updates re-point them to the
-- new version and a hard delete takes them along.
CREATE TABLE IF NOT EXISTS todo_items (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket_id   INTEGER NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
    description TEXT    NOT NULL,
    done        INTEGER NOT NULL DEFAULT 0 CHECK (done IN (0, 1)),
    position    INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT    NOT NULL,
    updated_at  TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS todo_items_ticket_idx ON todo_items(ticket_id, position);

PRAGMA user_version = 1;
";

/// Column list shared by every `SELECT` and `RETURNING` on `tickets`.
pub const TICKET_COLUMNS: &str = "id, ticket_category, ticket_number, description, \
   completion_criteria, version, valid_from, valid_to, is_active, created_at, updated_at";

/// Column list shared by every `SELECT` and `RETURNING` on `todo_items`.
pub const TODO_COLUMNS: &str =
  "id, ticket_id, description, done, position, created_at, updated_at";
