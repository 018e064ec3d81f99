//! Domain model for notes.
//!
//! A [`Note`] is the persisted entity; [`NoteCreate`] and [`NoteUpdate`] are
//! the validated write payloads, and [`NoteCursor`] is the opaque keyset
//! pagination position. All listing operations share one canonical ordering:
//! `created_at DESC, id DESC`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A persisted note.
///
/// `id` is assigned by the store on creation and never reused after
/// deletion. `created_at` is immutable; `updated_at` is refreshed on every
/// successful update, so `created_at <= updated_at` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Pagination cursor pointing at this note.
    pub fn cursor(&self) -> NoteCursor {
        NoteCursor {
            created_at: self.created_at,
            id: self.id,
        }
    }
}

/// Projection of a note carrying only `id` and `title`, used for batch
/// lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NoteShort {
    pub id: i64,
    pub title: String,
}

/// Payload for creating a note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteCreate {
    pub title: String,
    /// Optional in the wire format; empty when omitted.
    #[serde(default)]
    pub content: String,
}

impl NoteCreate {
    /// Validate and normalize the payload.
    ///
    /// The title must be non-blank after trimming; the trimmed form is what
    /// gets stored.
    pub fn validated(mut self) -> Result<Self> {
        let trimmed = self.title.trim().to_string();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("title must not be blank".into()));
        }
        self.title = trimmed;
        Ok(self)
    }
}

/// Partial-update payload.
///
/// Absent fields leave the corresponding column unchanged. A present but
/// blank title is rejected; a present empty content is allowed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl NoteUpdate {
    /// Validate and normalize the payload.
    pub fn validated(mut self) -> Result<Self> {
        if let Some(title) = self.title.take() {
            let trimmed = title.trim();
            if trimmed.is_empty() {
                return Err(Error::InvalidInput("title must not be blank".into()));
            }
            self.title = Some(trimmed.to_string());
        }
        Ok(self)
    }

    /// True when the payload changes nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

/// Keyset pagination position: the `(created_at, id)` pair of the last-seen
/// row under the canonical `created_at DESC, id DESC` ordering.
///
/// The wire form is opaque: base64url over `"{unix_micros}:{id}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteCursor {
    pub created_at: DateTime<Utc>,
    pub id: i64,
}

impl NoteCursor {
    /// Encode to the opaque wire form.
    pub fn encode(&self) -> String {
        let raw = format!("{}:{}", self.created_at.timestamp_micros(), self.id);
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    /// Decode from the opaque wire form.
    pub fn decode(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .map_err(|_| Error::InvalidInput("malformed cursor".into()))?;
        let raw = std::str::from_utf8(&bytes)
            .map_err(|_| Error::InvalidInput("malformed cursor".into()))?;
        let (micros, id) = raw
            .split_once(':')
            .ok_or_else(|| Error::InvalidInput("malformed cursor".into()))?;
        let micros: i64 = micros
            .parse()
            .map_err(|_| Error::InvalidInput("malformed cursor".into()))?;
        let id: i64 = id
            .parse()
            .map_err(|_| Error::InvalidInput("malformed cursor".into()))?;
        let created_at = DateTime::<Utc>::from_timestamp_micros(micros)
            .ok_or_else(|| Error::InvalidInput("malformed cursor".into()))?;
        Ok(Self { created_at, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_note() -> Note {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        Note {
            id: 7,
            title: "Sample".to_string(),
            content: "body".to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_note_create_trims_title() {
        let draft = NoteCreate {
            title: "  Groceries  ".to_string(),
            content: String::new(),
        };
        let draft = draft.validated().unwrap();
        assert_eq!(draft.title, "Groceries");
    }

    #[test]
    fn test_note_create_rejects_blank_title() {
        let draft = NoteCreate {
            title: "   \t".to_string(),
            content: "still has content".to_string(),
        };
        let err = draft.validated().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_note_create_content_defaults_empty() {
        let draft: NoteCreate = serde_json::from_str(r#"{"title":"A"}"#).unwrap();
        assert_eq!(draft.content, "");
    }

    #[test]
    fn test_note_update_absent_fields_pass_through() {
        let patch = NoteUpdate::default().validated().unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn test_note_update_rejects_blank_title() {
        let patch = NoteUpdate {
            title: Some("  ".to_string()),
            content: None,
        };
        assert!(patch.validated().is_err());
    }

    #[test]
    fn test_note_update_allows_empty_content() {
        let patch = NoteUpdate {
            title: None,
            content: Some(String::new()),
        };
        let patch = patch.validated().unwrap();
        assert_eq!(patch.content.as_deref(), Some(""));
    }

    #[test]
    fn test_note_update_absent_vs_present_in_json() {
        let patch: NoteUpdate = serde_json::from_str(r#"{"content":""}"#).unwrap();
        assert!(patch.title.is_none());
        assert_eq!(patch.content.as_deref(), Some(""));
    }

    #[test]
    fn test_cursor_round_trip() {
        let cursor = sample_note().cursor();
        let decoded = NoteCursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(NoteCursor::decode("not base64 at all!!").is_err());
        // Valid base64 but not "micros:id"
        let bogus = URL_SAFE_NO_PAD.encode(b"hello world");
        assert!(NoteCursor::decode(&bogus).is_err());
    }

    #[test]
    fn test_cursor_rejects_non_numeric_fields() {
        let bogus = URL_SAFE_NO_PAD.encode(b"abc:def");
        let err = NoteCursor::decode(&bogus).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_cursor_is_opaque() {
        let token = sample_note().cursor().encode();
        assert!(!token.contains(':'));
    }
}
