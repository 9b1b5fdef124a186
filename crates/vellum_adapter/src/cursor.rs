//! Opaque pagination cursors.
//!
//! A cursor is the base64 of the entity's internal row id. Callers treat
//! it as opaque; only the backend that produced it can decode it.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{RepoError, RepoResult};

/// Encodes an internal row id as an opaque cursor.
pub fn encode_cursor(internal_id: i64) -> String {
    BASE64.encode(internal_id.to_string())
}

/// Decodes a cursor back to an internal row id.
///
/// Fails with `BadRequest` on anything that did not come from
/// [`encode_cursor`].
pub fn decode_cursor(cursor: &str) -> RepoResult<i64> {
    let bytes = BASE64
        .decode(cursor)
        .map_err(|_| RepoError::bad_request(format!("invalid cursor: {cursor}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| RepoError::bad_request(format!("invalid cursor: {cursor}")))?;
    text.parse()
        .map_err(|_| RepoError::bad_request(format!("invalid cursor: {cursor}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for id in [0i64, 1, 42, i64::MAX] {
            assert_eq!(decode_cursor(&encode_cursor(id)).unwrap(), id);
        }
    }

    #[test]
    fn garbage_is_bad_request() {
        assert!(matches!(
            decode_cursor("not-base64!"),
            Err(RepoError::BadRequest(_))
        ));
        // Valid base64, but not a number.
        assert!(matches!(
            decode_cursor(&BASE64.encode("hello")),
            Err(RepoError::BadRequest(_))
        ));
    }
}
