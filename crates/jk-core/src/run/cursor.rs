//! Opaque pagination cursors.
//!
//! A cursor encodes `{jobPath, number}` as URL-safe base64 JSON. It binds
//! to the job path it was issued for: replaying it against another job is
//! a validation error, not a silent empty page.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CursorPayload {
    #[serde(default, rename = "jobPath", skip_serializing_if = "String::is_empty")]
    pub job_path: String,
    pub number: i64,
}

pub fn encode_cursor(job_path: &str, number: i64) -> String {
    let payload = CursorPayload {
        job_path: job_path.to_string(),
        number,
    };
    let bytes = serde_json::to_vec(&payload).unwrap_or_default();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub fn decode_cursor(cursor: &str) -> Result<CursorPayload> {
    if cursor.is_empty() {
        return Ok(CursorPayload::default());
    }
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|e| Error::InvalidCursor(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::InvalidCursor(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let token = encode_cursor("team/app", 42);
        let payload = decode_cursor(&token).unwrap();
        assert_eq!(payload.job_path, "team/app");
        assert_eq!(payload.number, 42);
    }

    #[test]
    fn test_round_trip_url_safe() {
        let token = encode_cursor("folder name/with?odd&chars", 7);
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
        assert!(!token.contains('='));
        assert_eq!(
            decode_cursor(&token).unwrap().job_path,
            "folder name/with?odd&chars"
        );
    }

    #[test]
    fn test_empty_cursor_decodes_to_default() {
        assert_eq!(decode_cursor("").unwrap(), CursorPayload::default());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            decode_cursor("!!not-base64!!"),
            Err(Error::InvalidCursor(_))
        ));
        let valid_b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"not json");
        assert!(matches!(
            decode_cursor(&valid_b64),
            Err(Error::InvalidCursor(_))
        ));
    }
}
