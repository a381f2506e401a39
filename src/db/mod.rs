//! Database abstraction layer.
//!
//! The portal keeps its users, clients and cases in a single embedded
//! database file. `libsql::LibSqlBackend` owns that file and exposes both a
//! thin SQL pass-through (`query`, `query_one`, `execute`, `transaction`) and
//! the typed stores below. Handlers depend on `Arc<dyn Database>`.

pub mod libsql;
pub mod seed;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::DatabaseError;

/// Open the configured database file, apply the schema, seed it if asked
/// to, and return it.
pub async fn connect_from_config(
    config: &crate::config::DatabaseConfig,
) -> Result<Arc<dyn Database>, DatabaseError> {
    let backend = libsql::LibSqlBackend::new_local(&config.path).await?;
    backend.run_migrations().await?;
    if config.seed_sample_data {
        seed::seed_sample_data(&backend).await?;
    }
    Ok(Arc::new(backend))
}

/// Portal role. Determines navigation and dashboard content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Lawyer,
    Paralegal,
    Client,
}

impl UserRole {
    pub const ALL: [UserRole; 4] = [Self::Admin, Self::Lawyer, Self::Paralegal, Self::Client];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Lawyer => "lawyer",
            Self::Paralegal => "paralegal",
            Self::Client => "client",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "lawyer" => Some(Self::Lawyer),
            "paralegal" => Some(Self::Paralegal),
            "client" => Some(Self::Client),
            _ => None,
        }
    }

    /// Lenient parse for request input: trims and ignores case.
    pub fn parse_loose(value: &str) -> Option<Self> {
        Self::from_db_value(value.trim().to_ascii_lowercase().as_str())
    }

    /// Firm members, as opposed to clients.
    pub fn is_staff(self) -> bool {
        !matches!(self, Self::Client)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: UserRole,
}

/// Client profile. Name and email live on the owning user row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub immigration_status: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateClientParams {
    pub user_id: i64,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub immigration_status: Option<String>,
    pub notes: Option<String>,
}

/// A client's legal matter. Status and priority are free text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: i64,
    pub client_id: i64,
    pub client_name: String,
    pub lawyer_id: Option<i64>,
    pub lawyer_name: Option<String>,
    pub paralegal_id: Option<i64>,
    pub paralegal_name: Option<String>,
    pub case_number: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub case_type: String,
    pub status: String,
    pub priority: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateCaseParams {
    pub client_id: i64,
    pub lawyer_id: Option<i64>,
    pub paralegal_id: Option<i64>,
    pub case_number: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub case_type: String,
    /// Defaults to `open`.
    pub status: Option<String>,
    /// Defaults to `medium`.
    pub priority: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDocumentRecord {
    pub id: i64,
    pub case_id: i64,
    pub name: String,
    pub doc_type: String,
    pub file_path: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateCaseDocumentParams {
    pub name: String,
    pub doc_type: String,
    pub file_path: Option<String>,
    /// Defaults to `pending`.
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseEventRecord {
    pub id: i64,
    pub case_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub event_date: NaiveDateTime,
    pub location: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateCaseEventParams {
    pub title: String,
    pub description: Option<String>,
    pub event_date: NaiveDateTime,
    pub location: Option<String>,
    /// Defaults to `upcoming`.
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseNoteRecord {
    pub id: i64,
    pub case_id: i64,
    pub user_id: i64,
    pub author_name: String,
    pub author_role: UserRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateCaseNoteParams {
    pub user_id: i64,
    pub content: String,
}

/// Hex-encoded SHA-256 of a password, as stored in `users.password_hash`.
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

/// Normalize an email for lookups and uniqueness.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

// ==================== Sub-traits ====================
//
// Each sub-trait groups related persistence methods. The `Database` supertrait
// combines them so handlers can hold a single `Arc<dyn Database>`.

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, input: &CreateUserParams) -> Result<UserRecord, DatabaseError>;
    async fn get_user(&self, id: i64) -> Result<Option<UserRecord>, DatabaseError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError>;
    async fn list_users(&self) -> Result<Vec<UserRecord>, DatabaseError>;
    async fn delete_user(&self, id: i64) -> Result<bool, DatabaseError>;
    /// Returns the user when the email/password pair matches.
    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, DatabaseError>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn create_client(&self, input: &CreateClientParams)
    -> Result<ClientRecord, DatabaseError>;
    async fn get_client(&self, id: i64) -> Result<Option<ClientRecord>, DatabaseError>;
    async fn get_client_by_user(&self, user_id: i64)
    -> Result<Option<ClientRecord>, DatabaseError>;
    async fn list_clients(&self) -> Result<Vec<ClientRecord>, DatabaseError>;
    async fn delete_client(&self, id: i64) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn create_case(&self, input: &CreateCaseParams) -> Result<CaseRecord, DatabaseError>;
    async fn get_case(&self, id: i64) -> Result<Option<CaseRecord>, DatabaseError>;
    async fn list_cases(&self) -> Result<Vec<CaseRecord>, DatabaseError>;
    async fn list_cases_for_client(&self, client_id: i64)
    -> Result<Vec<CaseRecord>, DatabaseError>;
    /// Cases assigned to a lawyer or paralegal. Other roles have no
    /// assignments and get an empty list.
    async fn list_cases_for_staff(
        &self,
        user_id: i64,
        role: UserRole,
    ) -> Result<Vec<CaseRecord>, DatabaseError>;
    async fn delete_case(&self, id: i64) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait CaseDocumentStore: Send + Sync {
    async fn create_case_document(
        &self,
        case_id: i64,
        input: &CreateCaseDocumentParams,
    ) -> Result<CaseDocumentRecord, DatabaseError>;
    async fn list_case_documents(
        &self,
        case_id: i64,
    ) -> Result<Vec<CaseDocumentRecord>, DatabaseError>;
}

#[async_trait]
pub trait CaseEventStore: Send + Sync {
    async fn create_case_event(
        &self,
        case_id: i64,
        input: &CreateCaseEventParams,
    ) -> Result<CaseEventRecord, DatabaseError>;
    async fn list_case_events(&self, case_id: i64) -> Result<Vec<CaseEventRecord>, DatabaseError>;
}

#[async_trait]
pub trait CaseNoteStore: Send + Sync {
    async fn create_case_note(
        &self,
        case_id: i64,
        input: &CreateCaseNoteParams,
    ) -> Result<CaseNoteRecord, DatabaseError>;
    async fn list_case_notes(&self, case_id: i64) -> Result<Vec<CaseNoteRecord>, DatabaseError>;
}

/// Backend-agnostic database supertrait.
#[async_trait]
pub trait Database:
    UserStore + ClientStore + CaseStore + CaseDocumentStore + CaseEventStore + CaseNoteStore + Send + Sync
{
    /// Apply the schema. Idempotent.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;
}
