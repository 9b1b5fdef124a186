//! Bounded suffix-retry resolution of name collisions.
//!
//! Names and published names are unique. On a collision the engine
//! retries with a randomized `#xxxxxxxx` suffix on the requested base, a
//! bounded number of times, then surfaces the conflict. Replays never
//! randomize: the event payload carries the final name the source chose.

use chrono::{DateTime, Utc};
use tracing::debug;
use vellum_adapter::{
    AdapterQueries, EntityStatus, NewEntityRow, RepoResult, UniqueConstraint,
};

const MAX_ATTEMPTS: usize = 10;

fn randomized(base: &str) -> String {
    format!("{base}#{:08x}", rand::random::<u32>())
}

/// Inserts an entity row, suffix-retrying the name on collision.
///
/// Returns the internal id and the name that won.
pub(crate) fn insert_with_unique_name<Q: AdapterQueries + ?Sized>(
    txn: &mut Q,
    mut row: NewEntityRow,
    replay: bool,
) -> RepoResult<(i64, String)> {
    let base = row.name.clone();
    let attempts = if replay { 1 } else { MAX_ATTEMPTS };
    for attempt in 0..attempts {
        match txn.entity_insert(&row) {
            Ok(internal_id) => return Ok((internal_id, row.name)),
            Err(err)
                if err == UniqueConstraint::EntityName.into_error()
                    && attempt + 1 < attempts =>
            {
                debug!(name = %row.name, "entity name taken, retrying with suffix");
                row.name = randomized(&base);
            }
            Err(err) => return Err(err),
        }
    }
    Err(UniqueConstraint::EntityName.into_error())
}

/// Renames an entity, suffix-retrying on collision. Returns the name
/// that won.
pub(crate) fn rename_with_unique_name<Q: AdapterQueries + ?Sized>(
    txn: &mut Q,
    internal_id: i64,
    base: &str,
    replay: bool,
) -> RepoResult<String> {
    let mut name = base.to_owned();
    let attempts = if replay { 1 } else { MAX_ATTEMPTS };
    for attempt in 0..attempts {
        match txn.entity_rename(internal_id, &name) {
            Ok(()) => return Ok(name),
            Err(err)
                if err == UniqueConstraint::EntityName.into_error()
                    && attempt + 1 < attempts =>
            {
                debug!(%name, "entity name taken, retrying with suffix");
                name = randomized(base);
            }
            Err(err) => return Err(err),
        }
    }
    Err(UniqueConstraint::EntityName.into_error())
}

/// Sets the published pointer with a published name, suffix-retrying the
/// name on collision. Returns the published name that won.
#[allow(clippy::too_many_arguments)]
pub(crate) fn set_published_with_unique_name<Q: AdapterQueries + ?Sized>(
    txn: &mut Q,
    internal_id: i64,
    published_version_id: i64,
    base: &str,
    status: EntityStatus,
    updated_at: DateTime<Utc>,
    replay: bool,
) -> RepoResult<String> {
    let mut name = base.to_owned();
    let attempts = if replay { 1 } else { MAX_ATTEMPTS };
    for attempt in 0..attempts {
        match txn.entity_update_published(
            internal_id,
            Some(published_version_id),
            Some(&name),
            status,
            updated_at,
        ) {
            Ok(()) => return Ok(name),
            Err(err)
                if err == UniqueConstraint::EntityPublishedName.into_error()
                    && attempt + 1 < attempts =>
            {
                debug!(%name, "published name taken, retrying with suffix");
                name = randomized(base);
            }
            Err(err) => return Err(err),
        }
    }
    Err(UniqueConstraint::EntityPublishedName.into_error())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_preserves_the_base() {
        let name = randomized("Foo");
        assert!(name.starts_with("Foo#"));
        assert_eq!(name.len(), "Foo#".len() + 8);
    }
}
