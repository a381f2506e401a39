//! Embedded libSQL backend.
//!
//! One local database file. Every operation opens a fresh connection with
//! foreign keys enabled; there is no pooling and no retry on lock.

mod portal;
mod schema;

use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::future::BoxFuture;
use libsql::params::Params;
use serde_json::Value as JsonValue;

use crate::db::Database;
use crate::error::DatabaseError;

/// A result row keyed by column name.
pub type SqlRow = serde_json::Map<String, JsonValue>;

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ExecuteResult {
    pub changes: u64,
    pub last_insert_id: i64,
}

pub struct LibSqlBackend {
    db: libsql::Database,
    path: PathBuf,
}

impl std::fmt::Debug for LibSqlBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibSqlBackend")
            .field("path", &self.path)
            .finish()
    }
}

impl LibSqlBackend {
    /// Open (or create) the database file at `path`.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DatabaseError::Pool(format!(
                    "failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("failed to open {}: {e}", path.display())))?;
        let backend = Self {
            db,
            path: path.to_path_buf(),
        };

        let conn = backend.connect().await?;
        conn.execute_batch("PRAGMA journal_mode = WAL;").await?;
        tracing::debug!(path = %path.display(), "opened portal database");
        Ok(backend)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;").await?;
        Ok(conn)
    }

    /// Run a read statement and return every row.
    pub async fn query(
        &self,
        sql: &str,
        params: Vec<libsql::Value>,
    ) -> Result<Vec<SqlRow>, DatabaseError> {
        let conn = self.connect().await?;
        query_rows(&conn, sql, params).await
    }

    /// Run a read statement and return the first row, if any.
    pub async fn query_one(
        &self,
        sql: &str,
        params: Vec<libsql::Value>,
    ) -> Result<Option<SqlRow>, DatabaseError> {
        let conn = self.connect().await?;
        query_first(&conn, sql, params).await
    }

    /// Run a write statement.
    pub async fn execute(
        &self,
        sql: &str,
        params: Vec<libsql::Value>,
    ) -> Result<ExecuteResult, DatabaseError> {
        let conn = self.connect().await?;
        execute_on(&conn, sql, params).await
    }

    /// Run `work` inside a transaction: commit when it returns `Ok`, roll
    /// back when it returns `Err`.
    pub async fn transaction<T, F>(&self, work: F) -> Result<T, DatabaseError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c libsql::Connection) -> BoxFuture<'c, Result<T, DatabaseError>>
            + Send,
    {
        let conn = self.connect().await?;
        let tx = conn.transaction().await?;
        let outcome = work(&*tx).await;
        match outcome {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }
}

#[async_trait::async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute_batch(schema::SCHEMA).await?;
        Ok(())
    }
}

/// [`LibSqlBackend::query`] on an existing connection or transaction.
pub async fn query_rows(
    conn: &libsql::Connection,
    sql: &str,
    params: Vec<libsql::Value>,
) -> Result<Vec<SqlRow>, DatabaseError> {
    let mut rows = conn.query(sql, Params::Positional(params)).await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_json(&row)?);
    }
    Ok(out)
}

pub async fn query_first(
    conn: &libsql::Connection,
    sql: &str,
    params: Vec<libsql::Value>,
) -> Result<Option<SqlRow>, DatabaseError> {
    let mut rows = conn.query(sql, Params::Positional(params)).await?;
    rows.next()
        .await?
        .map(|row| row_to_json(&row))
        .transpose()
}

pub async fn execute_on(
    conn: &libsql::Connection,
    sql: &str,
    params: Vec<libsql::Value>,
) -> Result<ExecuteResult, DatabaseError> {
    let changes = conn.execute(sql, Params::Positional(params)).await?;
    Ok(ExecuteResult {
        changes,
        last_insert_id: conn.last_insert_rowid(),
    })
}

fn row_to_json(row: &libsql::Row) -> Result<SqlRow, DatabaseError> {
    let mut out = SqlRow::new();
    for idx in 0..row.column_count() {
        let name = row.column_name(idx).unwrap_or_default().to_string();
        let value = match row.get_value(idx)? {
            libsql::Value::Null => JsonValue::Null,
            libsql::Value::Integer(v) => JsonValue::from(v),
            libsql::Value::Real(v) => serde_json::Number::from_f64(v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            libsql::Value::Text(v) => JsonValue::String(v),
            libsql::Value::Blob(v) => JsonValue::String(BASE64_STANDARD.encode(v)),
        };
        out.insert(name, value);
    }
    Ok(out)
}

// ==================== Column helpers ====================

pub(crate) fn get_text(row: &libsql::Row, idx: i32) -> String {
    get_opt_text(row, idx).unwrap_or_default()
}

pub(crate) fn get_opt_text(row: &libsql::Row, idx: i32) -> Option<String> {
    match row.get_value(idx) {
        Ok(libsql::Value::Text(value)) => Some(value),
        _ => None,
    }
}

pub(crate) fn get_i64(row: &libsql::Row, idx: i32) -> i64 {
    get_opt_i64(row, idx).unwrap_or_default()
}

pub(crate) fn get_opt_i64(row: &libsql::Row, idx: i32) -> Option<i64> {
    match row.get_value(idx) {
        Ok(libsql::Value::Integer(value)) => Some(value),
        _ => None,
    }
}

pub(crate) fn opt_text(value: Option<&str>) -> libsql::Value {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => libsql::Value::Text(v.to_string()),
        None => libsql::Value::Null,
    }
}

pub(crate) fn opt_i64(value: Option<i64>) -> libsql::Value {
    value.map_or(libsql::Value::Null, libsql::Value::Integer)
}

/// Parse either RFC 3339 or SQLite's `CURRENT_TIMESTAMP` format (UTC).
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use libsql::Value;
    use pretty_assertions::assert_eq;

    use super::*;

    struct TestBackend {
        backend: LibSqlBackend,
        _tmpdir: tempfile::TempDir,
    }

    async fn setup_backend() -> TestBackend {
        let tmpdir = tempfile::tempdir().expect("tempdir");
        let db_path = tmpdir.path().join("nested").join("portal_test.db");
        let backend = LibSqlBackend::new_local(&db_path)
            .await
            .expect("local backend should initialize");
        backend
            .run_migrations()
            .await
            .expect("migrations should succeed");
        TestBackend {
            backend,
            _tmpdir: tmpdir,
        }
    }

    #[tokio::test]
    async fn new_local_creates_parent_directory_and_schema() {
        let fixture = setup_backend().await;
        assert!(fixture.backend.path().exists());

        for table in ["users", "clients", "cases", "documents", "events", "notes"] {
            let row = fixture
                .backend
                .query_one(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                    vec![Value::Text(table.to_string())],
                )
                .await
                .expect("query sqlite_master");
            assert!(row.is_some(), "missing table {table}");
        }
    }

    #[tokio::test]
    async fn run_migrations_is_idempotent() {
        let fixture = setup_backend().await;
        fixture
            .backend
            .run_migrations()
            .await
            .expect("second migration run");
    }

    #[tokio::test]
    async fn execute_reports_changes_and_last_insert_id() {
        let fixture = setup_backend().await;
        let inserted = fixture
            .backend
            .execute(
                "INSERT INTO users (email, password_hash, name, role) VALUES (?1, ?2, ?3, ?4)",
                vec![
                    Value::Text("a@example.com".into()),
                    Value::Text("x".into()),
                    Value::Text("A".into()),
                    Value::Text("admin".into()),
                ],
            )
            .await
            .expect("insert");
        assert_eq!(inserted.changes, 1);
        assert!(inserted.last_insert_id > 0);

        let rows = fixture
            .backend
            .query("SELECT id, email, role FROM users", vec![])
            .await
            .expect("select");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], serde_json::json!(inserted.last_insert_id));
        assert_eq!(rows[0]["email"], serde_json::json!("a@example.com"));

        let updated = fixture
            .backend
            .execute(
                "UPDATE users SET name = ?1 WHERE id = ?2",
                vec![Value::Text("B".into()), Value::Integer(999)],
            )
            .await
            .expect("update");
        assert_eq!(updated.changes, 0);
    }

    #[tokio::test]
    async fn query_one_returns_none_for_no_rows() {
        let fixture = setup_backend().await;
        let row = fixture
            .backend
            .query_one(
                "SELECT id FROM users WHERE email = ?1",
                vec![Value::Text("nobody@example.com".into())],
            )
            .await
            .expect("query");
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn check_constraint_rejects_unknown_role() {
        let fixture = setup_backend().await;
        let err = fixture
            .backend
            .execute(
                "INSERT INTO users (email, password_hash, name, role) VALUES ('x@y.z', 'h', 'X', 'owner')",
                vec![],
            )
            .await
            .expect_err("role outside the four must be rejected");
        assert!(matches!(err, DatabaseError::Constraint(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_error() {
        let fixture = setup_backend().await;
        let result: Result<(), DatabaseError> = fixture
            .backend
            .transaction(|conn| {
                Box::pin(async move {
                    execute_on(
                        conn,
                        "INSERT INTO users (email, password_hash, name, role) VALUES ('t@x.z', 'h', 'T', 'admin')",
                        vec![],
                    )
                    .await?;
                    Err::<(), _>(DatabaseError::Query("abort".to_string()))
                })
            })
            .await;
        assert!(result.is_err());

        let rows = fixture
            .backend
            .query("SELECT id FROM users", vec![])
            .await
            .expect("select");
        assert!(rows.is_empty(), "insert must have been rolled back");
    }

    #[tokio::test]
    async fn transaction_commits_on_success() {
        let fixture = setup_backend().await;
        let id = fixture
            .backend
            .transaction(|conn| {
                Box::pin(async move {
                    let result = execute_on(
                        conn,
                        "INSERT INTO users (email, password_hash, name, role) VALUES ('c@x.z', 'h', 'C', 'lawyer')",
                        vec![],
                    )
                    .await?;
                    Ok::<_, DatabaseError>(result.last_insert_id)
                })
            })
            .await
            .expect("commit");

        let row = fixture
            .backend
            .query_one("SELECT role FROM users WHERE id = ?1", vec![Value::Integer(id)])
            .await
            .expect("select")
            .expect("row");
        assert_eq!(row["role"], serde_json::json!("lawyer"));
    }

    #[test]
    fn parse_timestamp_accepts_sqlite_and_rfc3339() {
        let sqlite = parse_timestamp("2025-03-01 10:20:30").expect("sqlite format");
        let rfc = parse_timestamp("2025-03-01T10:20:30Z").expect("rfc3339");
        assert_eq!(sqlite, rfc);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn opt_text_treats_blank_as_null() {
        assert_eq!(opt_text(Some("  ")), Value::Null);
        assert_eq!(opt_text(Some(" x ")), Value::Text("x".to_string()));
        assert_eq!(opt_text(None), Value::Null);
    }
}
