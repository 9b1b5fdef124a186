//! Physical postgres schema.
//!
//! Native uuid, timestamptz and boolean columns. Every unique constraint
//! carries an explicit name the error classifier recognizes.

use postgres::Client;
use vellum_adapter::{RepoError, RepoResult};

const DDL: &str = "
CREATE TABLE IF NOT EXISTS entities (
    internal_id          BIGSERIAL PRIMARY KEY,
    uuid                 UUID NOT NULL,
    entity_type          TEXT NOT NULL,
    name                 TEXT NOT NULL,
    published_name       TEXT,
    auth_key             TEXT NOT NULL DEFAULT '',
    resolved_auth_key    TEXT NOT NULL DEFAULT '',
    status               TEXT NOT NULL DEFAULT 'draft',
    never_published      BOOLEAN NOT NULL DEFAULT TRUE,
    dirty                BOOLEAN NOT NULL DEFAULT FALSE,
    created_at           TIMESTAMPTZ NOT NULL,
    updated_at           TIMESTAMPTZ NOT NULL,
    latest_version_id    BIGINT,
    published_version_id BIGINT,
    CONSTRAINT entities_uuid_key UNIQUE (uuid),
    CONSTRAINT entities_name_key UNIQUE (name),
    CONSTRAINT entities_published_name_key UNIQUE (published_name)
);
CREATE INDEX IF NOT EXISTS idx_entities_type ON entities (entity_type);
CREATE INDEX IF NOT EXISTS idx_entities_status ON entities (status);

CREATE TABLE IF NOT EXISTS entity_versions (
    id                 BIGSERIAL PRIMARY KEY,
    entity_internal_id BIGINT NOT NULL REFERENCES entities (internal_id),
    version            BIGINT NOT NULL,
    schema_version     BIGINT NOT NULL,
    created_at         TIMESTAMPTZ NOT NULL,
    created_by         UUID NOT NULL,
    fields_json        TEXT NOT NULL,
    CONSTRAINT entity_versions_entity_version_key UNIQUE (entity_internal_id, version)
);

CREATE TABLE IF NOT EXISTS unique_index_values (
    id                 BIGSERIAL PRIMARY KEY,
    index_name         TEXT NOT NULL,
    value              TEXT NOT NULL,
    entity_internal_id BIGINT NOT NULL REFERENCES entities (internal_id),
    latest             BOOLEAN NOT NULL,
    published          BOOLEAN NOT NULL,
    CONSTRAINT unique_index_values_pair_key UNIQUE (index_name, value)
);
CREATE INDEX IF NOT EXISTS idx_unique_values_entity
    ON unique_index_values (entity_internal_id);

CREATE TABLE IF NOT EXISTS entities_latest_fts (
    entity_internal_id BIGINT PRIMARY KEY REFERENCES entities (internal_id),
    content            TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS entities_published_fts (
    entity_internal_id BIGINT PRIMARY KEY REFERENCES entities (internal_id),
    content            TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS entity_latest_references (
    from_internal_id BIGINT NOT NULL REFERENCES entities (internal_id),
    to_internal_id   BIGINT NOT NULL REFERENCES entities (internal_id),
    PRIMARY KEY (from_internal_id, to_internal_id)
);
CREATE INDEX IF NOT EXISTS idx_references_to
    ON entity_latest_references (to_internal_id);

CREATE TABLE IF NOT EXISTS entity_component_types (
    entity_internal_id BIGINT NOT NULL REFERENCES entities (internal_id),
    component_type     TEXT NOT NULL,
    PRIMARY KEY (entity_internal_id, component_type)
);
CREATE INDEX IF NOT EXISTS idx_component_types_type
    ON entity_component_types (component_type);

CREATE TABLE IF NOT EXISTS events (
    id           BIGSERIAL PRIMARY KEY,
    event_type   TEXT NOT NULL,
    created_by   UUID NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL,
    payload_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS event_entity_versions (
    event_id   BIGINT NOT NULL REFERENCES events (id),
    version_id BIGINT NOT NULL REFERENCES entity_versions (id),
    PRIMARY KEY (event_id, version_id)
);
CREATE INDEX IF NOT EXISTS idx_event_versions_version
    ON event_entity_versions (version_id);

CREATE TABLE IF NOT EXISTS subjects (
    id         UUID PRIMARY KEY,
    provider   TEXT NOT NULL,
    identifier TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT subjects_identity_key UNIQUE (provider, identifier)
);

CREATE TABLE IF NOT EXISTS schema_versions (
    version    BIGINT NOT NULL,
    spec_json  TEXT NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT schema_versions_version_key UNIQUE (version)
);

CREATE TABLE IF NOT EXISTS advisory_locks (
    name       TEXT NOT NULL,
    handle     BIGINT NOT NULL,
    expires_at TIMESTAMPTZ NOT NULL,
    CONSTRAINT advisory_locks_pkey PRIMARY KEY (name)
);
";

/// Creates all tables and indexes if they do not exist yet.
pub(crate) fn ensure_schema(client: &mut Client) -> RepoResult<()> {
    client
        .batch_execute(DDL)
        .map_err(|e| RepoError::generic(format!("failed to create postgres schema: {e}")))
}
