//! Request and response DTOs for the portal HTTP API.

use serde::{Deserialize, Serialize};

use crate::assistant::DocumentCategory;
use crate::db::{
    CaseDocumentRecord, CaseEventRecord, CaseNoteRecord, CaseRecord, ClientRecord, UserRecord,
};
use crate::news::NewsItem;
use crate::portal::{NavLink, Role, ThemePreference};
use crate::upstream::DocumentQuestion;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub channel: &'static str,
    pub uptime_secs: u64,
    pub assistant_sessions: usize,
}

// --- Shell ---

#[derive(Debug, Default, Deserialize)]
pub struct NavigationQuery {
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShellQuery {
    pub role: Option<String>,
    pub theme: Option<String>,
    /// Whether the browser reports `prefers-color-scheme: dark`.
    #[serde(default)]
    pub system_dark: bool,
}

#[derive(Debug, Serialize)]
pub struct ShellResponse {
    pub role: Option<Role>,
    pub links: &'static [NavLink],
    pub theme: ThemePreference,
    pub resolved_theme: ThemePreference,
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub user_id: i64,
}

// --- Portal records ---

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: UserRecord,
}

#[derive(Debug, Serialize)]
pub struct ClientListResponse {
    pub clients: Vec<ClientRecord>,
}

#[derive(Debug, Serialize)]
pub struct CaseListResponse {
    pub cases: Vec<CaseRecord>,
}

#[derive(Debug, Serialize)]
pub struct CaseDocumentListResponse {
    pub documents: Vec<CaseDocumentRecord>,
}

#[derive(Debug, Serialize)]
pub struct CaseEventListResponse {
    pub events: Vec<CaseEventRecord>,
}

#[derive(Debug, Serialize)]
pub struct CaseNoteListResponse {
    pub notes: Vec<CaseNoteRecord>,
}

// --- Assistant ---

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default, alias = "userRole")]
    pub user_role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DocumentPreviewResponse {
    pub file_name: String,
    pub content_type: String,
    pub data_url: String,
}

// --- Document service proxy ---

#[derive(Debug, Serialize)]
pub struct DocumentTypesResponse {
    pub types: &'static [&'static str],
    pub categories: &'static [DocumentCategory],
}

#[derive(Debug, Default, Deserialize)]
pub struct QuestionsQuery {
    #[serde(rename = "type")]
    pub document_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub questions: Vec<DocumentQuestion>,
}

// --- Chat proxy ---

#[derive(Debug, Serialize)]
pub struct ChatProxyResponse {
    pub message: String,
}

// --- News ---

#[derive(Debug, Default, Deserialize)]
pub struct NewsParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<usize>,
    pub state: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewsResponse {
    pub news: Vec<NewsItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterOption {
    pub value: &'static str,
    pub label: &'static str,
}

impl From<&(&'static str, &'static str)> for FilterOption {
    fn from(&(value, label): &(&'static str, &'static str)) -> Self {
        Self { value, label }
    }
}

/// Choices for the ICE state filter and the USCIS category filter.
#[derive(Debug, Serialize)]
pub struct NewsFiltersResponse {
    pub states: Vec<FilterOption>,
    pub categories: Vec<FilterOption>,
}
