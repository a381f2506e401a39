use chrono::{NaiveDate, NaiveDateTime};
use libsql::params;
use subtle::ConstantTimeEq;

use crate::db::{
    CaseDocumentRecord, CaseDocumentStore, CaseEventRecord, CaseEventStore, CaseNoteRecord,
    CaseNoteStore, CaseRecord, CaseStore, ClientRecord, ClientStore, CreateCaseDocumentParams,
    CreateCaseEventParams, CreateCaseNoteParams, CreateCaseParams, CreateClientParams,
    CreateUserParams, UserRecord, UserRole, UserStore, hash_password, normalize_email,
};
use crate::error::DatabaseError;

use super::{
    LibSqlBackend, get_i64, get_opt_i64, get_opt_text, get_text, opt_i64, opt_text,
    parse_timestamp,
};

const USER_COLUMNS: &str = "id, email, name, role, created_at, updated_at";

const CLIENT_SELECT: &str = "SELECT c.id, c.user_id, u.name, u.email, c.phone, c.address, \
     c.birth_date, c.nationality, c.immigration_status, c.notes, c.created_at, c.updated_at \
     FROM clients c JOIN users u ON u.id = c.user_id";

const CASE_SELECT: &str = "SELECT k.id, k.client_id, cu.name, k.lawyer_id, lu.name, \
     k.paralegal_id, pu.name, k.case_number, k.title, k.description, k.case_type, k.status, \
     k.priority, k.start_date, k.due_date, k.created_at, k.updated_at \
     FROM cases k \
     JOIN clients c ON c.id = k.client_id \
     JOIN users cu ON cu.id = c.user_id \
     LEFT JOIN users lu ON lu.id = k.lawyer_id \
     LEFT JOIN users pu ON pu.id = k.paralegal_id";

const CASE_ORDER: &str = "ORDER BY k.created_at DESC, k.id DESC";

const DOCUMENT_COLUMNS: &str =
    "id, case_id, name, doc_type, file_path, status, notes, created_at, updated_at";

const EVENT_COLUMNS: &str =
    "id, case_id, title, description, event_date, location, status, created_at, updated_at";

const NOTE_SELECT: &str = "SELECT n.id, n.case_id, n.user_id, u.name, u.role, n.content, \
     n.created_at, n.updated_at FROM notes n JOIN users u ON u.id = n.user_id";

const DATE_FORMAT: &str = "%Y-%m-%d";
const EVENT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn ts(row: &libsql::Row, idx: i32) -> Result<chrono::DateTime<chrono::Utc>, DatabaseError> {
    parse_timestamp(&get_text(row, idx)).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn parse_role(raw: &str) -> Result<UserRole, DatabaseError> {
    UserRole::from_db_value(raw)
        .ok_or_else(|| DatabaseError::Serialization(format!("invalid user role '{}'", raw)))
}

fn parse_date_opt(raw: Option<String>) -> Result<Option<NaiveDate>, DatabaseError> {
    raw.map(|value| {
        NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
            .map_err(|e| DatabaseError::Serialization(format!("invalid date '{}': {}", value, e)))
    })
    .transpose()
}

fn parse_event_date(raw: &str) -> Result<NaiveDateTime, DatabaseError> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, EVENT_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map(|date| date.and_time(chrono::NaiveTime::MIN))
        })
        .map_err(|e| DatabaseError::Serialization(format!("invalid event_date '{}': {}", raw, e)))
}

fn fmt_date(date: Option<NaiveDate>) -> libsql::Value {
    date.map_or(libsql::Value::Null, |d| {
        libsql::Value::Text(d.format(DATE_FORMAT).to_string())
    })
}

fn require_text<'a>(value: &'a str, field: &str) -> Result<&'a str, DatabaseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DatabaseError::Serialization(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(trimmed)
}

fn row_to_user_record(row: &libsql::Row) -> Result<UserRecord, DatabaseError> {
    Ok(UserRecord {
        id: get_i64(row, 0),
        email: get_text(row, 1),
        name: get_text(row, 2),
        role: parse_role(&get_text(row, 3))?,
        created_at: ts(row, 4)?,
        updated_at: ts(row, 5)?,
    })
}

fn row_to_client_record(row: &libsql::Row) -> Result<ClientRecord, DatabaseError> {
    Ok(ClientRecord {
        id: get_i64(row, 0),
        user_id: get_i64(row, 1),
        name: get_text(row, 2),
        email: get_text(row, 3),
        phone: get_opt_text(row, 4),
        address: get_opt_text(row, 5),
        birth_date: parse_date_opt(get_opt_text(row, 6))?,
        nationality: get_opt_text(row, 7),
        immigration_status: get_opt_text(row, 8),
        notes: get_opt_text(row, 9),
        created_at: ts(row, 10)?,
        updated_at: ts(row, 11)?,
    })
}

fn row_to_case_record(row: &libsql::Row) -> Result<CaseRecord, DatabaseError> {
    Ok(CaseRecord {
        id: get_i64(row, 0),
        client_id: get_i64(row, 1),
        client_name: get_text(row, 2),
        lawyer_id: get_opt_i64(row, 3),
        lawyer_name: get_opt_text(row, 4),
        paralegal_id: get_opt_i64(row, 5),
        paralegal_name: get_opt_text(row, 6),
        case_number: get_opt_text(row, 7),
        title: get_text(row, 8),
        description: get_opt_text(row, 9),
        case_type: get_text(row, 10),
        status: get_text(row, 11),
        priority: get_opt_text(row, 12),
        start_date: parse_date_opt(get_opt_text(row, 13))?,
        due_date: parse_date_opt(get_opt_text(row, 14))?,
        created_at: ts(row, 15)?,
        updated_at: ts(row, 16)?,
    })
}

fn row_to_document_record(row: &libsql::Row) -> Result<CaseDocumentRecord, DatabaseError> {
    Ok(CaseDocumentRecord {
        id: get_i64(row, 0),
        case_id: get_i64(row, 1),
        name: get_text(row, 2),
        doc_type: get_text(row, 3),
        file_path: get_opt_text(row, 4),
        status: get_text(row, 5),
        notes: get_opt_text(row, 6),
        created_at: ts(row, 7)?,
        updated_at: ts(row, 8)?,
    })
}

fn row_to_event_record(row: &libsql::Row) -> Result<CaseEventRecord, DatabaseError> {
    Ok(CaseEventRecord {
        id: get_i64(row, 0),
        case_id: get_i64(row, 1),
        title: get_text(row, 2),
        description: get_opt_text(row, 3),
        event_date: parse_event_date(&get_text(row, 4))?,
        location: get_opt_text(row, 5),
        status: get_text(row, 6),
        created_at: ts(row, 7)?,
        updated_at: ts(row, 8)?,
    })
}

fn row_to_note_record(row: &libsql::Row) -> Result<CaseNoteRecord, DatabaseError> {
    Ok(CaseNoteRecord {
        id: get_i64(row, 0),
        case_id: get_i64(row, 1),
        user_id: get_i64(row, 2),
        author_name: get_text(row, 3),
        author_role: parse_role(&get_text(row, 4))?,
        content: get_text(row, 5),
        created_at: ts(row, 6)?,
        updated_at: ts(row, 7)?,
    })
}

async fn collect<T>(
    mut rows: libsql::Rows,
    map: fn(&libsql::Row) -> Result<T, DatabaseError>,
) -> Result<Vec<T>, DatabaseError> {
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(map(&row)?);
    }
    Ok(out)
}

#[async_trait::async_trait]
impl UserStore for LibSqlBackend {
    async fn create_user(&self, input: &CreateUserParams) -> Result<UserRecord, DatabaseError> {
        let email = normalize_email(&input.email);
        require_text(&email, "email")?;
        let name = require_text(&input.name, "name")?;
        if input.password.is_empty() {
            return Err(DatabaseError::Serialization(
                "password cannot be empty".to_string(),
            ));
        }

        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO users (email, password_hash, name, role) VALUES (?1, ?2, ?3, ?4)",
            params![
                email.as_str(),
                hash_password(&input.password),
                name,
                input.role.as_str()
            ],
        )
        .await?;
        let id = conn.last_insert_rowid();

        let row = conn
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
            )
            .await?
            .next()
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to load created user".to_string()))?;
        row_to_user_record(&row)
    }

    async fn get_user(&self, id: i64) -> Result<Option<UserRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
            )
            .await?;
        rows.next()
            .await?
            .map(|row| row_to_user_record(&row))
            .transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![normalize_email(email)],
            )
            .await?;
        rows.next()
            .await?
            .map(|row| row_to_user_record(&row))
            .transpose()
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let rows = conn
            .query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"), ())
            .await?;
        collect(rows, row_to_user_record).await
    }

    async fn delete_user(&self, id: i64) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let deleted = conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])
            .await?;
        Ok(deleted > 0)
    }

    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
                params![normalize_email(email)],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let stored = get_text(&row, 6);
        let candidate = hash_password(password);
        if bool::from(candidate.as_bytes().ct_eq(stored.as_bytes())) {
            row_to_user_record(&row).map(Some)
        } else {
            Ok(None)
        }
    }
}

#[async_trait::async_trait]
impl ClientStore for LibSqlBackend {
    async fn create_client(
        &self,
        input: &CreateClientParams,
    ) -> Result<ClientRecord, DatabaseError> {
        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO clients (user_id, phone, address, birth_date, nationality, immigration_status, notes) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                input.user_id,
                opt_text(input.phone.as_deref()),
                opt_text(input.address.as_deref()),
                fmt_date(input.birth_date),
                opt_text(input.nationality.as_deref()),
                opt_text(input.immigration_status.as_deref()),
                opt_text(input.notes.as_deref()),
            ],
        )
        .await?;
        let id = conn.last_insert_rowid();

        let row = conn
            .query(&format!("{CLIENT_SELECT} WHERE c.id = ?1"), params![id])
            .await?
            .next()
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to load created client".to_string()))?;
        row_to_client_record(&row)
    }

    async fn get_client(&self, id: i64) -> Result<Option<ClientRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(&format!("{CLIENT_SELECT} WHERE c.id = ?1"), params![id])
            .await?;
        rows.next()
            .await?
            .map(|row| row_to_client_record(&row))
            .transpose()
    }

    async fn get_client_by_user(
        &self,
        user_id: i64,
    ) -> Result<Option<ClientRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!("{CLIENT_SELECT} WHERE c.user_id = ?1 ORDER BY c.id LIMIT 1"),
                params![user_id],
            )
            .await?;
        rows.next()
            .await?
            .map(|row| row_to_client_record(&row))
            .transpose()
    }

    async fn list_clients(&self) -> Result<Vec<ClientRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let rows = conn
            .query(&format!("{CLIENT_SELECT} ORDER BY u.name, c.id"), ())
            .await?;
        collect(rows, row_to_client_record).await
    }

    async fn delete_client(&self, id: i64) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let deleted = conn
            .execute("DELETE FROM clients WHERE id = ?1", params![id])
            .await?;
        Ok(deleted > 0)
    }
}

#[async_trait::async_trait]
impl CaseStore for LibSqlBackend {
    async fn create_case(&self, input: &CreateCaseParams) -> Result<CaseRecord, DatabaseError> {
        let title = require_text(&input.title, "title")?;
        let case_type = require_text(&input.case_type, "case_type")?;
        let status = input
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("open");
        let priority = input
            .priority
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("medium");

        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO cases (client_id, lawyer_id, paralegal_id, case_number, title, description, \
             case_type, status, priority, start_date, due_date) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                input.client_id,
                opt_i64(input.lawyer_id),
                opt_i64(input.paralegal_id),
                opt_text(input.case_number.as_deref()),
                title,
                opt_text(input.description.as_deref()),
                case_type,
                status,
                priority,
                fmt_date(input.start_date),
                fmt_date(input.due_date),
            ],
        )
        .await?;
        let id = conn.last_insert_rowid();

        let row = conn
            .query(&format!("{CASE_SELECT} WHERE k.id = ?1"), params![id])
            .await?
            .next()
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to load created case".to_string()))?;
        row_to_case_record(&row)
    }

    async fn get_case(&self, id: i64) -> Result<Option<CaseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(&format!("{CASE_SELECT} WHERE k.id = ?1"), params![id])
            .await?;
        rows.next()
            .await?
            .map(|row| row_to_case_record(&row))
            .transpose()
    }

    async fn list_cases(&self) -> Result<Vec<CaseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let rows = conn
            .query(&format!("{CASE_SELECT} {CASE_ORDER}"), ())
            .await?;
        collect(rows, row_to_case_record).await
    }

    async fn list_cases_for_client(
        &self,
        client_id: i64,
    ) -> Result<Vec<CaseRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let rows = conn
            .query(
                &format!("{CASE_SELECT} WHERE k.client_id = ?1 {CASE_ORDER}"),
                params![client_id],
            )
            .await?;
        collect(rows, row_to_case_record).await
    }

    async fn list_cases_for_staff(
        &self,
        user_id: i64,
        role: UserRole,
    ) -> Result<Vec<CaseRecord>, DatabaseError> {
        let column = match role {
            UserRole::Lawyer => "k.lawyer_id",
            UserRole::Paralegal => "k.paralegal_id",
            UserRole::Admin | UserRole::Client => return Ok(Vec::new()),
        };
        let conn = self.connect().await?;
        let rows = conn
            .query(
                &format!("{CASE_SELECT} WHERE {column} = ?1 {CASE_ORDER}"),
                params![user_id],
            )
            .await?;
        collect(rows, row_to_case_record).await
    }

    async fn delete_case(&self, id: i64) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let deleted = conn
            .execute("DELETE FROM cases WHERE id = ?1", params![id])
            .await?;
        Ok(deleted > 0)
    }
}

#[async_trait::async_trait]
impl CaseDocumentStore for LibSqlBackend {
    async fn create_case_document(
        &self,
        case_id: i64,
        input: &CreateCaseDocumentParams,
    ) -> Result<CaseDocumentRecord, DatabaseError> {
        let name = require_text(&input.name, "name")?;
        let doc_type = require_text(&input.doc_type, "doc_type")?;
        let status = input
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("pending");

        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO documents (case_id, name, doc_type, file_path, status, notes) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                case_id,
                name,
                doc_type,
                opt_text(input.file_path.as_deref()),
                status,
                opt_text(input.notes.as_deref()),
            ],
        )
        .await?;
        let id = conn.last_insert_rowid();

        let row = conn
            .query(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
                params![id],
            )
            .await?
            .next()
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to load created document".to_string()))?;
        row_to_document_record(&row)
    }

    async fn list_case_documents(
        &self,
        case_id: i64,
    ) -> Result<Vec<CaseDocumentRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE case_id = ?1 \
                     ORDER BY created_at DESC, id DESC"
                ),
                params![case_id],
            )
            .await?;
        collect(rows, row_to_document_record).await
    }
}

#[async_trait::async_trait]
impl CaseEventStore for LibSqlBackend {
    async fn create_case_event(
        &self,
        case_id: i64,
        input: &CreateCaseEventParams,
    ) -> Result<CaseEventRecord, DatabaseError> {
        let title = require_text(&input.title, "title")?;
        let status = input
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("upcoming");

        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO events (case_id, title, description, event_date, location, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                case_id,
                title,
                opt_text(input.description.as_deref()),
                input.event_date.format(EVENT_FORMAT).to_string(),
                opt_text(input.location.as_deref()),
                status,
            ],
        )
        .await?;
        let id = conn.last_insert_rowid();

        let row = conn
            .query(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
                params![id],
            )
            .await?
            .next()
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to load created event".to_string()))?;
        row_to_event_record(&row)
    }

    async fn list_case_events(&self, case_id: i64) -> Result<Vec<CaseEventRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM events WHERE case_id = ?1 \
                     ORDER BY event_date ASC, id ASC"
                ),
                params![case_id],
            )
            .await?;
        collect(rows, row_to_event_record).await
    }
}

#[async_trait::async_trait]
impl CaseNoteStore for LibSqlBackend {
    async fn create_case_note(
        &self,
        case_id: i64,
        input: &CreateCaseNoteParams,
    ) -> Result<CaseNoteRecord, DatabaseError> {
        let content = require_text(&input.content, "content")?;

        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO notes (case_id, user_id, content) VALUES (?1, ?2, ?3)",
            params![case_id, input.user_id, content],
        )
        .await?;
        let id = conn.last_insert_rowid();

        let row = conn
            .query(&format!("{NOTE_SELECT} WHERE n.id = ?1"), params![id])
            .await?
            .next()
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to load created note".to_string()))?;
        row_to_note_record(&row)
    }

    async fn list_case_notes(&self, case_id: i64) -> Result<Vec<CaseNoteRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let rows = conn
            .query(
                &format!("{NOTE_SELECT} WHERE n.case_id = ?1 ORDER BY n.created_at DESC, n.id DESC"),
                params![case_id],
            )
            .await?;
        collect(rows, row_to_note_record).await
    }
}
