//! Axum HTTP server for the portal.
//!
//! Serves the navigation shell, role dashboards, read-only portal records,
//! assistant sessions, the document/chat/news proxies, and the embedded
//! static shell.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tokio::sync::{RwLock, oneshot};
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::assistant::{
    AssistantError, AssistantEvent, DOCUMENT_CATEGORIES, DOCUMENT_TYPES, SessionManager,
    SessionSnapshot,
};
use crate::channels::web::auth::{
    AUTH_TTL, AuthSessions, cleared_cookie, session_cookie, token_from_cookie_header,
};
use crate::channels::web::types::*;
use crate::db::{
    CaseDocumentStore, CaseEventStore, CaseNoteStore, CaseRecord, CaseStore, ClientStore, Database,
    UserRecord, UserStore,
};
use crate::error::{ChannelError, DatabaseError};
use crate::news::{
    NewsKind, US_STATES, USCIS_CATEGORIES, clamp_limit, filter_news, label_published,
};
use crate::portal::{DashboardView, Role, ThemePreference, build_dashboard, nav_links, nav_links_for};
use crate::upstream::documents::RESPONSE_FORMAT;
use crate::upstream::{
    ChatRequest, GenerateRequest, GeneratedPayload, NewsQuery, Upstream, UpstreamError,
};

/// Simple sliding-window rate limiter.
///
/// Tracks the number of requests in the current window. Resets when the window expires.
/// Shared by every caller, so it caps total load on the chat service rather than
/// per-client usage.
pub struct RateLimiter {
    remaining: AtomicU64,
    /// Epoch second when the current window started.
    window_start: AtomicU64,
    max_requests: u64,
    window_secs: u64,
}

fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl RateLimiter {
    pub fn new(max_requests: u64, window_secs: u64) -> Self {
        Self {
            remaining: AtomicU64::new(max_requests),
            window_start: AtomicU64::new(epoch_secs()),
            max_requests,
            window_secs,
        }
    }

    /// Try to consume one request. Returns `true` if allowed, `false` if rate limited.
    pub fn check(&self) -> bool {
        let now = epoch_secs();
        let window = self.window_start.load(Ordering::Relaxed);
        if now.saturating_sub(window) >= self.window_secs {
            self.window_start.store(now, Ordering::Relaxed);
            self.remaining
                .store(self.max_requests.saturating_sub(1), Ordering::Relaxed);
            return self.max_requests > 0;
        }

        loop {
            let current = self.remaining.load(Ordering::Relaxed);
            if current == 0 {
                return false;
            }
            if self
                .remaining
                .compare_exchange_weak(current, current - 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }
}

/// Shared state for all gateway handlers.
pub struct GatewayState {
    pub store: Arc<dyn Database>,
    pub upstream: Upstream,
    pub assistant: Arc<SessionManager>,
    /// Applies to `/api/chat` and to assistant messages that reach the chat
    /// service.
    pub chat_rate_limiter: RateLimiter,
    /// Account returned by `/api/user` when the request carries no sign-in
    /// cookie.
    pub demo_user_email: String,
    pub auth: AuthSessions,
    pub secure_cookies: bool,
    pub shutdown_tx: RwLock<Option<oneshot::Sender<()>>>,
    pub startup_time: Instant,
}

impl GatewayState {
    pub fn new(
        store: Arc<dyn Database>,
        upstream: Upstream,
        assistant: Arc<SessionManager>,
        chat_rate_limiter: RateLimiter,
        demo_user_email: impl Into<String>,
    ) -> Self {
        Self {
            store,
            upstream,
            assistant,
            chat_rate_limiter,
            demo_user_email: demo_user_email.into(),
            auth: AuthSessions::new(AUTH_TTL),
            secure_cookies: false,
            shutdown_tx: RwLock::new(None),
            startup_time: Instant::now(),
        }
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    /// Ask a running server to stop. Returns `false` if it was not running.
    pub async fn shutdown(&self) -> bool {
        match self.shutdown_tx.write().await.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self'; style-src 'self'; img-src 'self' data:; frame-src 'self' data:; connect-src 'self'; object-src 'none'; frame-ancestors 'none'; base-uri 'self'; form-action 'self'";

/// Start the gateway HTTP server.
///
/// Returns the actual bound `SocketAddr` (useful when binding to port 0).
pub async fn start_server(
    addr: SocketAddr,
    state: Arc<GatewayState>,
) -> Result<SocketAddr, ChannelError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ChannelError::StartupFailed {
            name: "gateway".to_string(),
            reason: format!("Failed to bind to {}: {}", addr, e),
        })?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| ChannelError::StartupFailed {
            name: "gateway".to_string(),
            reason: format!("Failed to get local addr: {}", e),
        })?;

    let api = Router::new()
        .route("/api/health", get(health_handler))
        // Shell
        .route("/api/navigation", get(navigation_handler))
        .route("/api/shell", get(shell_handler))
        .route("/api/dashboard", get(dashboard_handler))
        // Portal records
        .route("/api/user", get(current_user_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/clients", get(clients_list_handler))
        .route("/api/clients/{id}", get(client_detail_handler))
        .route("/api/clients/{id}/cases", get(client_cases_handler))
        .route("/api/cases", get(cases_list_handler))
        .route("/api/cases/{id}", get(case_detail_handler))
        .route("/api/cases/{id}/documents", get(case_documents_handler))
        .route("/api/cases/{id}/events", get(case_events_handler))
        .route("/api/cases/{id}/notes", get(case_notes_handler))
        // Assistant
        .route("/api/assistant/sessions", post(session_create_handler))
        .route(
            "/api/assistant/sessions/{id}",
            get(session_get_handler).delete(session_delete_handler),
        )
        .route(
            "/api/assistant/sessions/{id}/events",
            post(session_event_handler),
        )
        .route(
            "/api/assistant/sessions/{id}/document",
            get(session_document_handler),
        )
        .route(
            "/api/assistant/sessions/{id}/document/preview",
            get(session_preview_handler),
        )
        // Upstream proxies
        .route("/api/documents/types", get(document_types_handler))
        .route("/api/documents/questions", get(document_questions_handler))
        .route("/api/documents/generate", post(document_generate_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/immigration-news", get(news_handler))
        .route("/api/immigration-news/filters", get(news_filters_handler));

    // Static file routes, served from embedded strings
    let statics = Router::new()
        .route("/", get(index_handler))
        .route("/style.css", get(css_handler))
        .route("/app.js", get(js_handler));

    // Only the bound host and localhost origins are allowed.
    let origins: Vec<HeaderValue> = [
        format!("http://{}:{}", bound_addr.ip(), bound_addr.port()),
        format!("http://localhost:{}", bound_addr.port()),
    ]
    .iter()
    .filter_map(|origin| origin.parse().ok())
    .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers(AllowHeaders::list([header::CONTENT_TYPE]));

    let app = Router::new()
        .merge(api)
        .merge(statics)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB max request body
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    *state.shutdown_tx.write().await = Some(shutdown_tx);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Web gateway shutting down");
            })
            .await
        {
            tracing::error!("Web gateway server error: {}", e);
        }
    });

    tracing::info!(addr = %bound_addr, "web gateway listening");
    Ok(bound_addr)
}

// --- Errors ---

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn database_error(context: &str, err: DatabaseError) -> ApiError {
    tracing::error!("Failed to {}: {}", context, err);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "database error")
}

fn upstream_error(err: UpstreamError) -> ApiError {
    tracing::warn!(error = %err, "upstream request failed");
    api_error(StatusCode::BAD_GATEWAY, err.to_string())
}

fn assistant_error(err: AssistantError) -> ApiError {
    let status = match &err {
        AssistantError::Busy => StatusCode::CONFLICT,
        AssistantError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        AssistantError::UnknownSession(_) | AssistantError::NoDocument => StatusCode::NOT_FOUND,
        AssistantError::InvalidTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AssistantError::CorruptDocument(_) => StatusCode::BAD_GATEWAY,
    };
    api_error(status, err.to_string())
}

fn not_found(entity: &str, id: i64) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("{entity} {id} not found"))
}

fn unauthorized(message: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, message)
}

fn forbidden() -> ApiError {
    api_error(StatusCode::FORBIDDEN, "Acceso denegado")
}

fn rate_limited() -> ApiError {
    api_error(
        StatusCode::TOO_MANY_REQUESTS,
        "Too many chat messages, try again shortly",
    )
}

// --- Static file handlers ---

async fn index_handler() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        include_str!("static/index.html"),
    )
}

async fn css_handler() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/css"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        include_str!("static/style.css"),
    )
}

async fn js_handler() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        include_str!("static/app.js"),
    )
}

// --- Health ---

async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        channel: "gateway",
        uptime_secs: state.startup_time.elapsed().as_secs(),
        assistant_sessions: state.assistant.len().await,
    })
}

// --- Shell ---

async fn navigation_handler(Query(params): Query<NavigationQuery>) -> impl IntoResponse {
    let role = params.role.as_deref().unwrap_or("client");
    Json(nav_links_for(role))
}

async fn shell_handler(Query(params): Query<ShellQuery>) -> Json<ShellResponse> {
    let role = Role::parse_loose(params.role.as_deref().unwrap_or("client"));
    let theme = params
        .theme
        .as_deref()
        .and_then(|raw| raw.parse::<ThemePreference>().ok())
        .unwrap_or_default();
    Json(ShellResponse {
        role,
        links: nav_links(role),
        theme,
        resolved_theme: theme.resolve(params.system_dark),
    })
}

async fn dashboard_handler(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<DashboardQuery>,
) -> Result<Json<DashboardView>, ApiError> {
    let user = state
        .store
        .get_user(params.user_id)
        .await
        .map_err(|e| database_error("load dashboard user", e))?
        .ok_or_else(|| not_found("user", params.user_id))?;
    let view = build_dashboard(state.store.as_ref(), &user, Utc::now().naive_utc())
        .await
        .map_err(|e| database_error("build dashboard", e))?;
    Ok(Json(view))
}

// --- Sign-in ---

fn auth_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(token_from_cookie_header)
}

async fn signed_in_user(state: &GatewayState, token: &str) -> Result<UserRecord, ApiError> {
    let session = state
        .auth
        .lookup(token)
        .await
        .ok_or_else(|| unauthorized("Token inválido"))?;
    state
        .store
        .get_user(session.user_id)
        .await
        .map_err(|e| database_error("load signed-in user", e))?
        .ok_or_else(|| unauthorized("Token inválido"))
}

/// The user behind the request's sign-in cookie.
async fn require_user(state: &GatewayState, headers: &HeaderMap) -> Result<UserRecord, ApiError> {
    let token = auth_token(headers).ok_or_else(|| unauthorized("No autorizado"))?;
    signed_in_user(state, token).await
}

async fn require_staff(state: &GatewayState, headers: &HeaderMap) -> Result<UserRecord, ApiError> {
    let user = require_user(state, headers).await?;
    if user.role.is_staff() {
        Ok(user)
    } else {
        Err(forbidden())
    }
}

/// Staff see every case; a client only the cases filed under their profile.
async fn require_case_access(
    state: &GatewayState,
    headers: &HeaderMap,
    case_id: i64,
) -> Result<CaseRecord, ApiError> {
    let user = require_user(state, headers).await?;
    let case = state
        .store
        .get_case(case_id)
        .await
        .map_err(|e| database_error("load case", e))?
        .ok_or_else(|| not_found("case", case_id))?;
    if user.role.is_staff() {
        return Ok(case);
    }
    let profile = state
        .store
        .get_client_by_user(user.id)
        .await
        .map_err(|e| database_error("load client profile", e))?;
    if profile.is_some_and(|p| p.id == case.client_id) {
        Ok(case)
    } else {
        Err(forbidden())
    }
}

async fn current_user_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, ApiError> {
    if let Some(token) = auth_token(&headers) {
        let user = signed_in_user(&state, token).await?;
        return Ok(Json(UserResponse { user }));
    }
    let user = state
        .store
        .get_user_by_email(&state.demo_user_email)
        .await
        .map_err(|e| database_error("load current user", e))?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "no current user"))?;
    Ok(Json(UserResponse { user }))
}

async fn login_handler(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .store
        .verify_credentials(&body.email, &body.password)
        .await
        .map_err(|e| database_error("verify credentials", e))?
        .ok_or_else(|| unauthorized("Credenciales inválidas"))?;
    let token = state.auth.issue(user.id).await;
    let cookie = HeaderValue::from_str(&session_cookie(
        &token,
        state.auth.ttl(),
        state.secure_cookies,
    ))
    .map_err(|e| {
        tracing::error!("Failed to build session cookie: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "session error")
    })?;
    let active_sessions = state.auth.len().await;
    tracing::info!(
        user_id = user.id,
        role = user.role.as_str(),
        active_sessions = active_sessions,
        "user signed in"
    );
    Ok(([(header::SET_COOKIE, cookie)], Json(UserResponse { user })))
}

async fn logout_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(token) = auth_token(&headers)
        && state.auth.revoke(token).await
    {
        tracing::info!("user signed out");
    }
    (
        StatusCode::NO_CONTENT,
        [(
            header::SET_COOKIE,
            HeaderValue::from_static(cleared_cookie(state.secure_cookies)),
        )],
    )
}

// --- Portal records ---

async fn clients_list_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<Json<ClientListResponse>, ApiError> {
    require_staff(&state, &headers).await?;
    let clients = state
        .store
        .list_clients()
        .await
        .map_err(|e| database_error("list clients", e))?;
    Ok(Json(ClientListResponse { clients }))
}

async fn client_detail_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_staff(&state, &headers).await?;
    let client = state
        .store
        .get_client(id)
        .await
        .map_err(|e| database_error("load client", e))?
        .ok_or_else(|| not_found("client", id))?;
    Ok(Json(client))
}

async fn client_cases_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<CaseListResponse>, ApiError> {
    require_staff(&state, &headers).await?;
    state
        .store
        .get_client(id)
        .await
        .map_err(|e| database_error("load client", e))?
        .ok_or_else(|| not_found("client", id))?;
    let cases = state
        .store
        .list_cases_for_client(id)
        .await
        .map_err(|e| database_error("list client cases", e))?;
    Ok(Json(CaseListResponse { cases }))
}

async fn cases_list_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<Json<CaseListResponse>, ApiError> {
    require_staff(&state, &headers).await?;
    let cases = state
        .store
        .list_cases()
        .await
        .map_err(|e| database_error("list cases", e))?;
    Ok(Json(CaseListResponse { cases }))
}

async fn case_detail_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<CaseRecord>, ApiError> {
    let case = require_case_access(&state, &headers, id).await?;
    Ok(Json(case))
}

async fn case_documents_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<CaseDocumentListResponse>, ApiError> {
    require_case_access(&state, &headers, id).await?;
    let documents = state
        .store
        .list_case_documents(id)
        .await
        .map_err(|e| database_error("list case documents", e))?;
    Ok(Json(CaseDocumentListResponse { documents }))
}

async fn case_events_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<CaseEventListResponse>, ApiError> {
    require_case_access(&state, &headers, id).await?;
    let events = state
        .store
        .list_case_events(id)
        .await
        .map_err(|e| database_error("list case events", e))?;
    Ok(Json(CaseEventListResponse { events }))
}

async fn case_notes_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<CaseNoteListResponse>, ApiError> {
    require_case_access(&state, &headers, id).await?;
    let notes = state
        .store
        .list_case_notes(id)
        .await
        .map_err(|e| database_error("list case notes", e))?;
    Ok(Json(CaseNoteListResponse { notes }))
}

// --- Assistant sessions ---

async fn session_create_handler(
    State(state): State<Arc<GatewayState>>,
    body: Option<Json<CreateSessionRequest>>,
) -> (StatusCode, Json<SessionSnapshot>) {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let snapshot = state.assistant.create(request.user_role.as_deref()).await;
    (StatusCode::CREATED, Json(snapshot))
}

async fn session_get_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    state
        .assistant
        .snapshot(id)
        .await
        .map(Json)
        .map_err(assistant_error)
}

async fn session_delete_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.assistant.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(assistant_error(AssistantError::UnknownSession(id)))
    }
}

async fn session_event_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
    Json(event): Json<AssistantEvent>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    state
        .assistant
        .dispatch_limited(id, event, || state.chat_rate_limiter.check())
        .await
        .map(Json)
        .map_err(assistant_error)
}

/// RFC 5987 `attr-char`; every other byte is percent-encoded in `filename*`.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// `attachment` disposition with an ASCII fallback name and the UTF-8 name.
fn content_disposition(file_name: &str) -> HeaderValue {
    let ascii: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let encoded = utf8_percent_encode(file_name, ATTR_CHAR);
    HeaderValue::from_str(&format!(
        "attachment; filename=\"{ascii}\"; filename*=UTF-8''{encoded}"
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

async fn session_document_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let document = state.assistant.document(id).await.map_err(assistant_error)?;
    let bytes = document
        .decode()
        .map_err(|e| assistant_error(AssistantError::CorruptDocument(e.to_string())))?;
    let content_type = HeaderValue::from_str(&document.content_type())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&document.file_name()),
            ),
        ],
        bytes,
    ))
}

async fn session_preview_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentPreviewResponse>, ApiError> {
    let document = state.assistant.document(id).await.map_err(assistant_error)?;
    Ok(Json(DocumentPreviewResponse {
        file_name: document.file_name(),
        content_type: document.content_type(),
        data_url: document.data_url(),
    }))
}

// --- Upstream proxies ---

async fn document_types_handler() -> Json<DocumentTypesResponse> {
    Json(DocumentTypesResponse {
        types: DOCUMENT_TYPES,
        categories: DOCUMENT_CATEGORIES,
    })
}

async fn document_questions_handler(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<QuestionsQuery>,
) -> Result<Json<QuestionsResponse>, ApiError> {
    let document_type = params
        .document_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Se requiere el tipo de documento"))?;
    let questions = state
        .upstream
        .documents
        .questions(document_type)
        .await
        .map_err(upstream_error)?;
    Ok(Json(QuestionsResponse { questions }))
}

async fn document_generate_handler(
    State(state): State<Arc<GatewayState>>,
    Json(mut request): Json<GenerateRequest>,
) -> Result<Json<GeneratedPayload>, ApiError> {
    if request.document_type.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Se requiere el tipo de documento",
        ));
    }
    if request.respuesta_formato.trim().is_empty() {
        request.respuesta_formato = RESPONSE_FORMAT.to_string();
    }
    let payload = state
        .upstream
        .documents
        .generate(&request)
        .await
        .map_err(upstream_error)?;
    Ok(Json(payload))
}

async fn chat_handler(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatProxyResponse>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Empty message"));
    }
    if !state.chat_rate_limiter.check() {
        return Err(rate_limited());
    }
    let message = state
        .upstream
        .chat
        .complete(&request)
        .await
        .map_err(upstream_error)?;
    Ok(Json(ChatProxyResponse { message }))
}

async fn news_handler(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<NewsParams>,
) -> Result<Json<NewsResponse>, ApiError> {
    let kind = NewsKind::parse(params.kind.as_deref());
    let query = NewsQuery {
        kind,
        limit: clamp_limit(params.limit),
    };
    let items = state
        .upstream
        .news
        .fetch(&query)
        .await
        .map_err(upstream_error)?;
    let mut news = filter_news(
        items,
        kind,
        params.state.as_deref(),
        params.category.as_deref(),
    );
    label_published(&mut news);
    Ok(Json(NewsResponse { news }))
}

async fn news_filters_handler() -> Json<NewsFiltersResponse> {
    Json(NewsFiltersResponse {
        states: US_STATES.iter().map(FilterOption::from).collect(),
        categories: USCIS_CATEGORIES.iter().map(FilterOption::from).collect(),
    })
}
