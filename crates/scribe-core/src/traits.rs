//! Core traits for scribe abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Note, NoteCreate, NoteCursor, NoteShort, NoteUpdate};

/// Repository for note CRUD operations.
///
/// Implementations are stateless between calls; all state lives in the
/// backing store. Every listing method uses the canonical
/// `created_at DESC, id DESC` ordering.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a new note and return its id.
    async fn create(&self, draft: NoteCreate) -> Result<i64>;

    /// Insert a new note together with an audit-log entry, atomically.
    ///
    /// Both rows commit together or neither is visible.
    async fn create_with_log(&self, draft: NoteCreate) -> Result<i64>;

    /// Fetch a note by id. A missing id is `Error::NoteNotFound`.
    async fn get(&self, id: i64) -> Result<Note>;

    /// Partially update a note. Absent fields keep their stored value;
    /// `updated_at` is always refreshed. Zero affected rows is
    /// `Error::NoteNotFound`.
    async fn update(&self, id: i64, patch: NoteUpdate) -> Result<()>;

    /// Hard-delete a note. Zero affected rows is `Error::NoteNotFound`.
    async fn delete(&self, id: i64) -> Result<()>;

    /// First page of notes under the canonical ordering.
    async fn list_first_page(&self, limit: i64) -> Result<Vec<Note>>;

    /// Notes strictly after `cursor` under the canonical ordering.
    async fn list_after(&self, cursor: &NoteCursor, limit: i64) -> Result<Vec<Note>>;

    /// Batched `id`/`title` projection fetch. Empty input returns an empty
    /// vector without touching the store; result order is storage-defined.
    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<NoteShort>>;

    /// Every note, canonical ordering, no limit.
    ///
    /// Intended for small datasets (exports, tests). Production listing
    /// goes through the paginated methods.
    async fn get_all(&self) -> Result<Vec<Note>>;
}
