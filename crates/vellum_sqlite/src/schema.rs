//! Physical sqlite schema.
//!
//! All timestamps are RFC 3339 text, uuids are text, booleans are 0/1
//! integers. Unique constraints are declared so that their violation
//! messages name the columns the error classifier looks for.

use rusqlite::Connection;
use vellum_adapter::{RepoError, RepoResult};

const DDL: &str = "
CREATE TABLE IF NOT EXISTS entities (
    internal_id          INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid                 TEXT NOT NULL UNIQUE,
    entity_type          TEXT NOT NULL,
    name                 TEXT NOT NULL UNIQUE,
    published_name       TEXT UNIQUE,
    auth_key             TEXT NOT NULL DEFAULT '',
    resolved_auth_key    TEXT NOT NULL DEFAULT '',
    status               TEXT NOT NULL DEFAULT 'draft',
    never_published      INTEGER NOT NULL DEFAULT 1,
    dirty                INTEGER NOT NULL DEFAULT 0,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL,
    latest_version_id    INTEGER,
    published_version_id INTEGER
);
CREATE INDEX IF NOT EXISTS idx_entities_type ON entities (entity_type);
CREATE INDEX IF NOT EXISTS idx_entities_status ON entities (status);

CREATE TABLE IF NOT EXISTS entity_versions (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_internal_id INTEGER NOT NULL REFERENCES entities (internal_id),
    version            INTEGER NOT NULL,
    schema_version     INTEGER NOT NULL,
    created_at         TEXT NOT NULL,
    created_by         TEXT NOT NULL,
    fields_json        TEXT NOT NULL,
    UNIQUE (entity_internal_id, version)
);

CREATE TABLE IF NOT EXISTS unique_index_values (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    index_name         TEXT NOT NULL,
    value              TEXT NOT NULL,
    entity_internal_id INTEGER NOT NULL REFERENCES entities (internal_id),
    latest             INTEGER NOT NULL,
    published          INTEGER NOT NULL,
    UNIQUE (index_name, value)
);
CREATE INDEX IF NOT EXISTS idx_unique_values_entity
    ON unique_index_values (entity_internal_id);

CREATE TABLE IF NOT EXISTS entities_latest_fts (
    entity_internal_id INTEGER PRIMARY KEY REFERENCES entities (internal_id),
    content            TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS entities_published_fts (
    entity_internal_id INTEGER PRIMARY KEY REFERENCES entities (internal_id),
    content            TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS entity_latest_references (
    from_internal_id INTEGER NOT NULL REFERENCES entities (internal_id),
    to_internal_id   INTEGER NOT NULL REFERENCES entities (internal_id),
    PRIMARY KEY (from_internal_id, to_internal_id)
);
CREATE INDEX IF NOT EXISTS idx_references_to
    ON entity_latest_references (to_internal_id);

CREATE TABLE IF NOT EXISTS entity_component_types (
    entity_internal_id INTEGER NOT NULL REFERENCES entities (internal_id),
    component_type     TEXT NOT NULL,
    PRIMARY KEY (entity_internal_id, component_type)
);
CREATE INDEX IF NOT EXISTS idx_component_types_type
    ON entity_component_types (component_type);

CREATE TABLE IF NOT EXISTS events (
    id           INTEGER PRIMARY KEY,
    event_type   TEXT NOT NULL,
    created_by   TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    payload_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS event_entity_versions (
    event_id   INTEGER NOT NULL REFERENCES events (id),
    version_id INTEGER NOT NULL REFERENCES entity_versions (id),
    PRIMARY KEY (event_id, version_id)
);
CREATE INDEX IF NOT EXISTS idx_event_versions_version
    ON event_entity_versions (version_id);

CREATE TABLE IF NOT EXISTS subjects (
    id         TEXT PRIMARY KEY,
    provider   TEXT NOT NULL,
    identifier TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (provider, identifier)
);

CREATE TABLE IF NOT EXISTS schema_versions (
    version    INTEGER NOT NULL UNIQUE,
    spec_json  TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS advisory_locks (
    name       TEXT PRIMARY KEY,
    handle     INTEGER NOT NULL,
    expires_at TEXT NOT NULL
);
";

/// Creates all tables and indexes if they do not exist yet.
pub(crate) fn ensure_schema(conn: &Connection) -> RepoResult<()> {
    conn.execute_batch(DDL)
        .map_err(|e| RepoError::generic(format!("failed to create sqlite schema: {e}")))
}
