//! Note repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use scribe_core::{
    Error, Note, NoteCreate, NoteCursor, NoteRepository, NoteShort, NoteUpdate, Result,
};

/// Audit-log action recorded alongside each logged creation.
const LOG_ACTION_CREATED: &str = "created";

/// Columns fetched for a full [`Note`] row.
const NOTE_COLUMNS: &str = "id, title, content, created_at, updated_at";

/// PostgreSQL implementation of [`NoteRepository`].
///
/// Stateless between calls; identity and timestamps are assigned by column
/// defaults so the database is the single source of truth for both.
pub struct PgNoteRepository {
    pool: PgPool,
}

impl PgNoteRepository {
    /// Create a new PgNoteRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a note inside an existing transaction, returning its id.
    async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        draft: &NoteCreate,
    ) -> Result<i64> {
        let id: i64 =
            sqlx::query_scalar("INSERT INTO notes (title, content) VALUES ($1, $2) RETURNING id")
                .bind(&draft.title)
                .bind(&draft.content)
                .fetch_one(&mut **tx)
                .await
                .map_err(Error::Database)?;
        Ok(id)
    }
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn create(&self, draft: NoteCreate) -> Result<i64> {
        let id: i64 =
            sqlx::query_scalar("INSERT INTO notes (title, content) VALUES ($1, $2) RETURNING id")
                .bind(&draft.title)
                .bind(&draft.content)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "notes",
            op = "create",
            note_id = id,
            "Note created"
        );
        Ok(id)
    }

    async fn create_with_log(&self, draft: NoteCreate) -> Result<i64> {
        // The transaction rolls back on drop, so any early return below
        // leaves no trace of the note.
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let id = Self::insert_tx(&mut tx, &draft).await?;

        sqlx::query("INSERT INTO notes_log (note_id, action, created_at) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(LOG_ACTION_CREATED)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "notes",
            op = "create_with_log",
            note_id = id,
            "Note and audit entry committed"
        );
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Note> {
        let note = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        note.ok_or(Error::NoteNotFound(id))
    }

    async fn update(&self, id: i64, patch: NoteUpdate) -> Result<()> {
        // Absent fields keep the stored value; updated_at is refreshed
        // unconditionally.
        let result = sqlx::query(
            "UPDATE notes
             SET title = COALESCE($1, title),
                 content = COALESCE($2, content),
                 updated_at = $3
             WHERE id = $4",
        )
        .bind(patch.title.as_deref())
        .bind(patch.content.as_deref())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(id));
        }

        debug!(
            subsystem = "db",
            component = "notes",
            op = "delete",
            note_id = id,
            "Note deleted"
        );
        Ok(())
    }

    async fn list_first_page(&self, limit: i64) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes
             ORDER BY created_at DESC, id DESC
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(notes)
    }

    async fn list_after(&self, cursor: &NoteCursor, limit: i64) -> Result<Vec<Note>> {
        // Single composite row comparison. Two independent filters would
        // skip or duplicate rows when notes share a created_at.
        let notes = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes
             WHERE (created_at, id) < ($1, $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3"
        ))
        .bind(cursor.created_at)
        .bind(cursor.id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(notes)
    }

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<NoteShort>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let notes =
            sqlx::query_as::<_, NoteShort>("SELECT id, title FROM notes WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(notes)
    }

    async fn get_all(&self) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes
             ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(notes)
    }
}
