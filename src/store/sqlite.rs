//! SQLite implementation of the record-store contract (portico.db).
//!
//! Two connection pools back one handle:
//!
//! - `pool` serves normal reads and all writes.
//! - `fresh_pool` is a single-connection pool opened from the same options,
//!   used exclusively by `fetch_fresh`. Verification reads therefore never
//!   ride the session that performed the write, which is the point of the
//!   post-write verification step.
//!
//! WAL journaling keeps the fresh reader from blocking on the writer.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::{
    ApprovalUpdate, ClientStatus, PortalTokenRecord, Proposal, ProposalStore, StoreError,
    TokenStore,
};

/// Schema, applied idempotently on open.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS proposals (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    client_name     TEXT NOT NULL,
    client_email    TEXT NOT NULL,
    total_amount    REAL,
    status          TEXT,
    client_status   TEXT NOT NULL DEFAULT 'pending',
    client_feedback TEXT,
    approved_at     INTEGER,
    approved_by     TEXT,
    created_at      INTEGER NOT NULL,
    updated_at      INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS portal_tokens (
    proposal_id    TEXT PRIMARY KEY,
    token          TEXT NOT NULL UNIQUE,
    client_name    TEXT NOT NULL,
    client_email   TEXT NOT NULL,
    issued_at      INTEGER NOT NULL,
    expires_at     INTEGER NOT NULL,
    view_count     INTEGER NOT NULL DEFAULT 0,
    last_viewed_at INTEGER
);
"#;

/// SQLite-backed record store.
///
/// Cheap to clone; clones share both pools.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
    fresh_pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (creating if missing) the database at `path` and apply the schema.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options.clone())
            .await?;

        // Dedicated verification read path: one connection, same database
        let fresh_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        Ok(Self { pool, fresh_pool })
    }

    fn row_to_proposal(row: &sqlx::sqlite::SqliteRow) -> Result<Proposal, StoreError> {
        let client_status: String = row.try_get("client_status").map_err(StoreError::from)?;
        Ok(Proposal {
            id: row.try_get("id").map_err(StoreError::from)?,
            name: row.try_get("name").map_err(StoreError::from)?,
            client_name: row.try_get("client_name").map_err(StoreError::from)?,
            client_email: row.try_get("client_email").map_err(StoreError::from)?,
            total_amount: row.try_get("total_amount").map_err(StoreError::from)?,
            status: row.try_get("status").map_err(StoreError::from)?,
            client_status: ClientStatus::parse(&client_status)?,
            client_feedback: row.try_get("client_feedback").map_err(StoreError::from)?,
            approved_at: row
                .try_get::<Option<i64>, _>("approved_at")
                .map_err(StoreError::from)?
                .map(|v| v as u64),
            approved_by: row.try_get("approved_by").map_err(StoreError::from)?,
            created_at: row.try_get::<i64, _>("created_at").map_err(StoreError::from)? as u64,
            updated_at: row.try_get::<i64, _>("updated_at").map_err(StoreError::from)? as u64,
        })
    }

    fn row_to_token(row: &sqlx::sqlite::SqliteRow) -> Result<PortalTokenRecord, StoreError> {
        Ok(PortalTokenRecord {
            proposal_id: row.try_get("proposal_id").map_err(StoreError::from)?,
            token: row.try_get("token").map_err(StoreError::from)?,
            client_name: row.try_get("client_name").map_err(StoreError::from)?,
            client_email: row.try_get("client_email").map_err(StoreError::from)?,
            issued_at: row.try_get::<i64, _>("issued_at").map_err(StoreError::from)? as u64,
            expires_at: row.try_get::<i64, _>("expires_at").map_err(StoreError::from)? as u64,
            view_count: row.try_get::<i64, _>("view_count").map_err(StoreError::from)? as u64,
            last_viewed_at: row
                .try_get::<Option<i64>, _>("last_viewed_at")
                .map_err(StoreError::from)?
                .map(|v| v as u64),
        })
    }

    async fn fetch_from(&self, pool: &SqlitePool, id: &str) -> Result<Option<Proposal>, StoreError> {
        let row = sqlx::query("SELECT * FROM proposals WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        row.as_ref().map(Self::row_to_proposal).transpose()
    }
}

#[async_trait]
impl ProposalStore for SqliteRecordStore {
    async fn insert(&self, proposal: &Proposal) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO proposals \
             (id, name, client_name, client_email, total_amount, status, client_status, \
              client_feedback, approved_at, approved_by, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(&proposal.id)
        .bind(&proposal.name)
        .bind(&proposal.client_name)
        .bind(&proposal.client_email)
        .bind(proposal.total_amount)
        .bind(&proposal.status)
        .bind(proposal.client_status.as_str())
        .bind(&proposal.client_feedback)
        .bind(proposal.approved_at.map(|v| v as i64))
        .bind(&proposal.approved_by)
        .bind(proposal.created_at as i64)
        .bind(proposal.updated_at as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Proposal>, StoreError> {
        self.fetch_from(&self.pool, id).await
    }

    async fn fetch_fresh(&self, id: &str) -> Result<Option<Proposal>, StoreError> {
        self.fetch_from(&self.fresh_pool, id).await
    }

    async fn update_approval(&self, id: &str, update: &ApprovalUpdate) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE proposals SET \
             client_status = ?1, client_feedback = ?2, approved_at = ?3, \
             approved_by = ?4, updated_at = ?5 \
             WHERE id = ?6",
        )
        .bind(update.client_status.as_str())
        .bind(&update.client_feedback)
        .bind(update.approved_at.map(|v| v as i64))
        .bind(&update.approved_by)
        .bind(update.updated_at as i64)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("proposal {}", id)));
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM proposals")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n").map_err(StoreError::from)?;
        Ok(n as u64)
    }
}

#[async_trait]
impl TokenStore for SqliteRecordStore {
    async fn save(&self, record: &PortalTokenRecord) -> Result<(), StoreError> {
        // Upsert keyed by proposal_id: the previous active token (if any)
        // is overwritten and becomes unresolvable via lookup.
        sqlx::query(
            "INSERT INTO portal_tokens \
             (proposal_id, token, client_name, client_email, issued_at, expires_at, \
              view_count, last_viewed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT(proposal_id) DO UPDATE SET \
             token = excluded.token, \
             client_name = excluded.client_name, \
             client_email = excluded.client_email, \
             issued_at = excluded.issued_at, \
             expires_at = excluded.expires_at, \
             view_count = excluded.view_count, \
             last_viewed_at = excluded.last_viewed_at",
        )
        .bind(&record.proposal_id)
        .bind(&record.token)
        .bind(&record.client_name)
        .bind(&record.client_email)
        .bind(record.issued_at as i64)
        .bind(record.expires_at as i64)
        .bind(record.view_count as i64)
        .bind(record.last_viewed_at.map(|v| v as i64))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn lookup(&self, token: &str) -> Result<Option<PortalTokenRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM portal_tokens WHERE token = ?1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_token).transpose()
    }

    async fn record_view(&self, token: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE portal_tokens SET view_count = view_count + 1, last_viewed_at = ?1 \
             WHERE token = ?2",
        )
        .bind(super::now_unix() as i64)
        .bind(token)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("token".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::now_unix;
    use tempfile::TempDir;

    async fn open_temp() -> (TempDir, SqliteRecordStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteRecordStore::open(&dir.path().join("portico.db"))
            .await
            .unwrap();
        (dir, store)
    }

    fn sample_token(proposal_id: &str, token: &str) -> PortalTokenRecord {
        let now = now_unix();
        PortalTokenRecord {
            proposal_id: proposal_id.to_string(),
            token: token.to_string(),
            client_name: "Jane Doe".to_string(),
            client_email: "jane@example.com".to_string(),
            issued_at: now,
            expires_at: now + 3600,
            view_count: 0,
            last_viewed_at: None,
        }
    }

    #[tokio::test]
    async fn test_proposal_insert_fetch_round_trip() {
        let (_dir, store) = open_temp().await;

        let mut proposal = Proposal::new("Website redesign", "Jane Doe", "jane@example.com");
        proposal.total_amount = Some(12_500.0);
        proposal.status = Some("sent".to_string());
        store.insert(&proposal).await.unwrap();

        let loaded = store.fetch(&proposal.id).await.unwrap().unwrap();
        assert_eq!(loaded, proposal);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fetch_missing_is_none() {
        let (_dir, store) = open_temp().await;
        assert!(store.fetch("nope").await.unwrap().is_none());
        assert!(store.fetch_fresh("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_approval_and_fresh_read() {
        let (_dir, store) = open_temp().await;

        let proposal = Proposal::new("Website redesign", "Jane Doe", "jane@example.com");
        store.insert(&proposal).await.unwrap();

        let now = now_unix();
        let update = ApprovalUpdate {
            client_status: ClientStatus::Approved,
            client_feedback: Some("Looks great".to_string()),
            approved_at: Some(now),
            approved_by: Some("Jane Doe".to_string()),
            updated_at: now,
        };
        store.update_approval(&proposal.id, &update).await.unwrap();

        // The fresh pool must observe the committed write
        let fresh = store.fetch_fresh(&proposal.id).await.unwrap().unwrap();
        assert_eq!(fresh.client_status, ClientStatus::Approved);
        assert_eq!(fresh.client_feedback.as_deref(), Some("Looks great"));
        assert_eq!(fresh.approved_by.as_deref(), Some("Jane Doe"));
        assert_eq!(fresh.approved_at, Some(now));
    }

    #[tokio::test]
    async fn test_update_approval_clears_approval_fields() {
        let (_dir, store) = open_temp().await;

        let proposal = Proposal::new("Website redesign", "Jane Doe", "jane@example.com");
        store.insert(&proposal).await.unwrap();

        let now = now_unix();
        let approve = ApprovalUpdate {
            client_status: ClientStatus::Approved,
            client_feedback: None,
            approved_at: Some(now),
            approved_by: Some("Jane Doe".to_string()),
            updated_at: now,
        };
        store.update_approval(&proposal.id, &approve).await.unwrap();

        // Moving away from approved must fully replace the field set
        let reject = ApprovalUpdate {
            client_status: ClientStatus::Rejected,
            client_feedback: Some("Changed our mind".to_string()),
            approved_at: None,
            approved_by: None,
            updated_at: now + 1,
        };
        store.update_approval(&proposal.id, &reject).await.unwrap();

        let loaded = store.fetch(&proposal.id).await.unwrap().unwrap();
        assert_eq!(loaded.client_status, ClientStatus::Rejected);
        assert!(loaded.approved_at.is_none());
        assert!(loaded.approved_by.is_none());
    }

    #[tokio::test]
    async fn test_update_approval_missing_proposal() {
        let (_dir, store) = open_temp().await;

        let update = ApprovalUpdate {
            client_status: ClientStatus::Approved,
            client_feedback: None,
            approved_at: Some(now_unix()),
            approved_by: None,
            updated_at: now_unix(),
        };
        let err = store.update_approval("ghost", &update).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_token_save_overwrites_previous() {
        let (_dir, store) = open_temp().await;

        let first = sample_token("p1", "token-one");
        store.save(&first).await.unwrap();

        let second = sample_token("p1", "token-two");
        store.save(&second).await.unwrap();

        // Old token is unresolvable; new token resolves
        assert!(store.lookup("token-one").await.unwrap().is_none());
        let active = store.lookup("token-two").await.unwrap().unwrap();
        assert_eq!(active.proposal_id, "p1");
    }

    #[tokio::test]
    async fn test_record_view_increments() {
        let (_dir, store) = open_temp().await;

        let record = sample_token("p1", "token-one");
        store.save(&record).await.unwrap();

        store.record_view("token-one").await.unwrap();
        store.record_view("token-one").await.unwrap();

        let loaded = store.lookup("token-one").await.unwrap().unwrap();
        assert_eq!(loaded.view_count, 2);
        assert!(loaded.last_viewed_at.is_some());
    }

    #[tokio::test]
    async fn test_record_view_unknown_token() {
        let (_dir, store) = open_temp().await;
        let err = store.record_view("ghost").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
