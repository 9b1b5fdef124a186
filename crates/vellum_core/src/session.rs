//! Sessions and authorization-key resolution.

use std::sync::Arc;

use uuid::Uuid;
use vellum_adapter::{RepoError, RepoResult};

/// A caller identity bound to a subject row.
///
/// Sessions are cheap value objects; the repository only reads the
/// subject id and the readonly flag from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The subject this session acts as.
    pub subject_id: Uuid,
    /// Readonly sessions are rejected for all mutations.
    pub readonly: bool,
}

impl Session {
    /// Creates a writable session for a subject.
    pub fn writable(subject_id: Uuid) -> Self {
        Self {
            subject_id,
            readonly: false,
        }
    }

    /// Creates a readonly session for a subject.
    pub fn readonly(subject_id: Uuid) -> Self {
        Self {
            subject_id,
            readonly: true,
        }
    }

    /// Fails with `BadRequest` when a readonly session attempts `operation`.
    pub fn require_writable(&self, operation: &str) -> RepoResult<()> {
        if self.readonly {
            return Err(RepoError::bad_request(format!(
                "Readonly session used to {operation}"
            )));
        }
        Ok(())
    }
}

/// Resolves caller-supplied authorization keys into their stored form.
///
/// Authentication itself is out of scope; the repository only compares
/// resolved keys. The default resolver is the identity function.
pub trait AuthKeyResolver: Send + Sync {
    /// Resolves an authorization key.
    fn resolve(&self, auth_key: &str) -> RepoResult<String>;
}

/// Identity resolver: the resolved key equals the supplied key.
#[derive(Debug, Default)]
pub struct PassthroughAuthKeys;

impl AuthKeyResolver for PassthroughAuthKeys {
    fn resolve(&self, auth_key: &str) -> RepoResult<String> {
        Ok(auth_key.to_owned())
    }
}

/// Checks a caller-supplied key against an entity's resolved key.
///
/// Entities without an authorization key are open to every caller.
pub fn check_auth_key(
    resolver: &Arc<dyn AuthKeyResolver>,
    stored_resolved: &str,
    supplied: Option<&str>,
) -> RepoResult<()> {
    if stored_resolved.is_empty() {
        return Ok(());
    }
    let supplied = supplied.unwrap_or_default();
    if resolver.resolve(supplied)? != stored_resolved {
        return Err(RepoError::not_authorized("Wrong authKey provided"));
    }
    Ok(())
}
