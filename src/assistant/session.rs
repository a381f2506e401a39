//! Per-tab assistant session: transcript plus the document-generation flow.
//!
//! The session never performs I/O. [`AssistantSession::apply`] makes the local
//! transition for an event and may hand back a [`PendingCall`]; the caller
//! runs it against the upstream services and reports the result through
//! [`AssistantSession::resolve`]. Only one call is in flight at a time.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AssistantError;
use super::document::{DOCUMENT_TYPES, GeneratedDocument};
use super::intent::{Intent, classify, match_document_type};
use crate::upstream::documents::RESPONSE_FORMAT;
use crate::upstream::{
    ChatRequest, ChatRole, ChatTurn, DocumentFormat, DocumentQuestion, GenerateRequest,
    GeneratedPayload, UpstreamError,
};

pub const WELCOME: &str = "¡Bienvenido al asistente legal de inmigración! Puedo ayudarte a responder preguntas sobre inmigración y generar documentos legales personalizados. ¿En qué puedo ayudarte hoy?";
pub const QUESTIONS_ERROR: &str = "Lo siento, hubo un error al obtener las preguntas para este documento. Por favor, intenta de nuevo más tarde o selecciona otro tipo de documento.";
pub const READY_PROMPT: &str =
    "¡Gracias! He recopilado toda la información necesaria. ¿Quieres generar el documento ahora?";
pub const GENERATING: &str = "Generando documento, por favor espera...";
pub const GENERATED: &str = "¡Documento generado exitosamente! Puedes previsualizarlo y descargarlo usando los botones a continuación.";
pub const GENERATE_ERROR: &str = "Lo siento, hubo un error al generar el documento. Por favor, verifica la información proporcionada e intenta de nuevo.";
pub const NEWS_OPENED: &str = "He abierto el panel de noticias de inmigración donde puedes ver las últimas actualizaciones de ICE y USCIS. ¿Hay algún tema específico sobre el que quieras más información?";
pub const CHAT_ERROR: &str =
    "Lo siento, hubo un error al procesar tu mensaje. Por favor, intenta de nuevo.";
pub const RESET: &str =
    "Se ha reiniciado el proceso de generación de documentos. ¿En qué más puedo ayudarte?";

// Shorter forms recorded in the chat context.
const QUESTIONS_ERROR_CONTEXT: &str =
    "Lo siento, hubo un error al obtener las preguntas para este documento.";
const GENERATED_CONTEXT: &str =
    "¡Documento generado exitosamente! Puedes previsualizarlo y descargarlo.";
const GENERATE_ERROR_CONTEXT: &str = "Lo siento, hubo un error al generar el documento.";
const NEWS_OPENED_CONTEXT: &str =
    "He abierto el panel de noticias de inmigración donde puedes ver las últimas actualizaciones.";
const CHAT_ERROR_CONTEXT: &str = "Lo siento, hubo un error al procesar tu mensaje.";
const RESET_CONTEXT: &str = "Se ha reiniciado el proceso de generación de documentos.";

fn selection_request(document_type: &str) -> String {
    format!("Quiero generar un documento de tipo \"{document_type}\"")
}

fn selection_announcement(document_type: &str) -> String {
    format!(
        "Has seleccionado el documento \"{document_type}\". Ahora te haré algunas preguntas para completar la información necesaria."
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    AwaitingAnswer { index: usize },
    ReadyToGenerate,
    Generating,
    Generated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Panel {
    #[default]
    None,
    Document,
    News,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Something the user did in the widget.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantEvent {
    SelectDocumentType { document_type: String },
    Message { text: String },
    Generate,
    Reset,
    ToggleNews,
    SetFormat { format: DocumentFormat },
}

/// Identifies one outstanding call. Outcomes carrying any other ticket are
/// discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Ticket(u64);

/// A remote call the session needs performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCall {
    Questions {
        ticket: Ticket,
        document_type: String,
    },
    Generate {
        ticket: Ticket,
        request: GenerateRequest,
    },
    Chat {
        ticket: Ticket,
        request: ChatRequest,
    },
}

impl PendingCall {
    pub fn ticket(&self) -> Ticket {
        match self {
            Self::Questions { ticket, .. }
            | Self::Generate { ticket, .. }
            | Self::Chat { ticket, .. } => *ticket,
        }
    }
}

/// Result of a [`PendingCall`].
#[derive(Debug)]
pub enum CallOutcome {
    Questions(Result<Vec<DocumentQuestion>, UpstreamError>),
    Generate(Result<GeneratedPayload, UpstreamError>),
    Chat(Result<String, UpstreamError>),
}

#[derive(Debug, Clone)]
enum CallKind {
    Questions { document_type: String },
    Generate,
    Chat,
}

#[derive(Debug, Clone)]
struct InFlight {
    ticket: Ticket,
    kind: CallKind,
    resume: Phase,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub document_type: String,
    pub format: DocumentFormat,
    pub file_name: String,
}

/// Serializable view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub user_role: String,
    pub phase: Phase,
    pub panel: Panel,
    pub format: DocumentFormat,
    pub busy: bool,
    pub selected_document_type: Option<String>,
    pub document_questions: Vec<DocumentQuestion>,
    pub current_question: Option<DocumentQuestion>,
    pub client_data: BTreeMap<String, String>,
    pub document: Option<DocumentSummary>,
    pub messages: Vec<TranscriptEntry>,
}

#[derive(Debug)]
pub struct AssistantSession {
    id: Uuid,
    user_role: String,
    messages: Vec<TranscriptEntry>,
    history: Vec<ChatTurn>,
    selected_document_type: Option<String>,
    document_questions: Vec<DocumentQuestion>,
    client_data: BTreeMap<String, String>,
    generated: Option<GeneratedDocument>,
    format: DocumentFormat,
    panel: Panel,
    phase: Phase,
    in_flight: Option<InFlight>,
    next_ticket: u64,
    last_active: Instant,
}

impl AssistantSession {
    pub fn new(user_role: impl Into<String>) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            user_role: user_role.into(),
            messages: Vec::new(),
            history: Vec::new(),
            selected_document_type: None,
            document_questions: Vec::new(),
            client_data: BTreeMap::new(),
            generated: None,
            format: DocumentFormat::default(),
            panel: Panel::None,
            phase: Phase::Idle,
            in_flight: None,
            next_ticket: 0,
            last_active: Instant::now(),
        };
        session.push(ChatRole::System, WELCOME);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn panel(&self) -> Panel {
        self.panel
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn messages(&self) -> &[TranscriptEntry] {
        &self.messages
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn selected_document_type(&self) -> Option<&str> {
        self.selected_document_type.as_deref()
    }

    pub fn document_questions(&self) -> &[DocumentQuestion] {
        &self.document_questions
    }

    pub fn client_data(&self) -> &BTreeMap<String, String> {
        &self.client_data
    }

    pub fn generated(&self) -> Option<&GeneratedDocument> {
        self.generated.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn last_active(&self) -> Instant {
        self.last_active
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let current_question = match self.phase {
            Phase::AwaitingAnswer { index } => self.document_questions.get(index).cloned(),
            _ => None,
        };
        SessionSnapshot {
            id: self.id,
            user_role: self.user_role.clone(),
            phase: self.phase,
            panel: self.panel,
            format: self.format,
            busy: self.is_busy(),
            selected_document_type: self.selected_document_type.clone(),
            document_questions: self.document_questions.clone(),
            current_question,
            client_data: self.client_data.clone(),
            document: self.generated.as_ref().map(|doc| DocumentSummary {
                document_type: doc.document_type.clone(),
                format: doc.format,
                file_name: doc.file_name(),
            }),
            messages: self.messages.clone(),
        }
    }

    /// Apply a user event. Returns the remote call to perform, if any.
    pub fn apply(&mut self, event: AssistantEvent) -> Result<Option<PendingCall>, AssistantError> {
        self.last_active = Instant::now();
        if self.in_flight.is_some() && event != AssistantEvent::Reset {
            return Err(AssistantError::Busy);
        }

        match event {
            AssistantEvent::SelectDocumentType { document_type } => {
                let document_type = document_type.trim();
                if document_type.is_empty() {
                    return Err(AssistantError::InvalidTransition(
                        "document type must not be empty".to_string(),
                    ));
                }
                Ok(Some(self.request_questions(document_type.to_string())))
            }
            AssistantEvent::Message { text } => Ok(self.on_message(text)),
            AssistantEvent::Generate => match self.phase {
                Phase::ReadyToGenerate | Phase::Generated => self.start_generation().map(Some),
                other => Err(AssistantError::InvalidTransition(format!(
                    "cannot generate while {}",
                    phase_name(other)
                ))),
            },
            AssistantEvent::Reset => {
                self.reset();
                Ok(None)
            }
            AssistantEvent::ToggleNews => {
                self.panel = if self.panel == Panel::News {
                    Panel::None
                } else {
                    Panel::News
                };
                Ok(None)
            }
            AssistantEvent::SetFormat { format } => {
                self.format = format;
                Ok(None)
            }
        }
    }

    /// Feed back the outcome of the call issued under `ticket`. Returns
    /// `false` when the outcome was stale and ignored.
    pub fn resolve(&mut self, ticket: Ticket, outcome: CallOutcome) -> bool {
        self.last_active = Instant::now();
        let Some(in_flight) = self.in_flight.take_if(|f| f.ticket == ticket) else {
            tracing::debug!(session = %self.id, ?ticket, "discarding stale assistant outcome");
            return false;
        };

        match (in_flight.kind, outcome) {
            (CallKind::Questions { document_type }, CallOutcome::Questions(result)) => {
                match result {
                    Ok(questions) if !questions.is_empty() => {
                        self.begin_questions(document_type, questions)
                    }
                    Ok(_) => self.questions_failed(&document_type, "empty question list"),
                    Err(err) => self.questions_failed(&document_type, &err.to_string()),
                }
            }
            (CallKind::Generate, CallOutcome::Generate(result)) => match result {
                Ok(payload) => self.finish_generation(payload),
                Err(err) => {
                    tracing::warn!(session = %self.id, error = %err, "document generation failed");
                    self.phase = in_flight.resume;
                    self.say(ChatRole::System, GENERATE_ERROR, GENERATE_ERROR_CONTEXT);
                }
            },
            (CallKind::Chat, CallOutcome::Chat(result)) => match result {
                Ok(reply) => self.say(ChatRole::Assistant, &reply, &reply),
                Err(err) => {
                    tracing::warn!(session = %self.id, error = %err, "chat completion failed");
                    self.say(ChatRole::System, CHAT_ERROR, CHAT_ERROR_CONTEXT);
                }
            },
            (kind, outcome) => {
                tracing::warn!(session = %self.id, ?kind, ?outcome, "outcome does not match pending call");
                self.phase = in_flight.resume;
                return false;
            }
        }
        true
    }

    fn on_message(&mut self, text: String) -> Option<PendingCall> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let prior_history = self.history.clone();
        self.say(ChatRole::User, text, text);

        let intent = classify(text);
        if intent == Intent::News {
            self.panel = Panel::News;
            self.say(ChatRole::Assistant, NEWS_OPENED, NEWS_OPENED_CONTEXT);
            return None;
        }

        match self.phase {
            Phase::AwaitingAnswer { index } => {
                self.record_answer(index, text);
                None
            }
            Phase::ReadyToGenerate if intent == Intent::Confirm => self.start_generation().ok(),
            Phase::Idle if self.selected_document_type.is_none() => {
                match match_document_type(text, DOCUMENT_TYPES) {
                    Some(document_type) => Some(self.request_questions(document_type.to_string())),
                    None => Some(self.request_chat(text, prior_history)),
                }
            }
            _ => Some(self.request_chat(text, prior_history)),
        }
    }

    fn record_answer(&mut self, index: usize, answer: &str) {
        let Some(question) = self.document_questions.get(index) else {
            self.phase = Phase::ReadyToGenerate;
            return;
        };
        self.client_data
            .insert(question.id.clone(), answer.to_string());

        match self.document_questions.get(index + 1) {
            Some(next) => {
                let text = next.text.clone();
                self.phase = Phase::AwaitingAnswer { index: index + 1 };
                self.say(ChatRole::Assistant, &text, &text);
            }
            None => {
                self.phase = Phase::ReadyToGenerate;
                self.say(ChatRole::Assistant, READY_PROMPT, READY_PROMPT);
            }
        }
        tracing::debug!(session = %self.id, phase = ?self.phase, "recorded answer");
    }

    fn request_questions(&mut self, document_type: String) -> PendingCall {
        let request = selection_request(&document_type);
        self.say(ChatRole::User, &request, &request);
        let ticket = self.issue(
            CallKind::Questions {
                document_type: document_type.clone(),
            },
            self.phase,
        );
        PendingCall::Questions {
            ticket,
            document_type,
        }
    }

    fn begin_questions(&mut self, document_type: String, questions: Vec<DocumentQuestion>) {
        let announcement = selection_announcement(&document_type);
        let first = questions[0].text.clone();

        self.selected_document_type = Some(document_type);
        self.document_questions = questions;
        self.client_data.clear();
        self.generated = None;
        self.panel = Panel::Document;
        self.phase = Phase::AwaitingAnswer { index: 0 };

        self.push(ChatRole::System, &announcement);
        self.history
            .push(ChatTurn::new(ChatRole::Assistant, announcement));
        self.say(ChatRole::Assistant, &first, &first);
        tracing::debug!(session = %self.id, "document questions loaded");
    }

    fn questions_failed(&mut self, document_type: &str, reason: &str) {
        tracing::warn!(session = %self.id, document_type, reason, "could not load document questions");
        self.say(ChatRole::System, QUESTIONS_ERROR, QUESTIONS_ERROR_CONTEXT);
    }

    fn start_generation(&mut self) -> Result<PendingCall, AssistantError> {
        let Some(document_type) = self.selected_document_type.clone() else {
            return Err(AssistantError::InvalidTransition(
                "no document type selected".to_string(),
            ));
        };
        let resume = self.phase;
        self.phase = Phase::Generating;
        self.say(ChatRole::System, GENERATING, GENERATING);

        let request = GenerateRequest {
            document_type,
            formato: self.format,
            respuesta_formato: RESPONSE_FORMAT.to_string(),
            client_data: self.client_data.clone(),
        };
        let ticket = self.issue(CallKind::Generate, resume);
        Ok(PendingCall::Generate { ticket, request })
    }

    fn finish_generation(&mut self, payload: GeneratedPayload) {
        let document_type = self.selected_document_type.clone().unwrap_or_default();
        self.generated = Some(GeneratedDocument {
            document_type,
            format: payload.formato,
            base64: payload.contenido_base64,
        });
        self.phase = Phase::Generated;
        self.say(ChatRole::System, GENERATED, GENERATED_CONTEXT);
        tracing::debug!(session = %self.id, "document generated");
    }

    fn request_chat(&mut self, text: &str, history: Vec<ChatTurn>) -> PendingCall {
        let ticket = self.issue(CallKind::Chat, self.phase);
        PendingCall::Chat {
            ticket,
            request: ChatRequest {
                message: text.to_string(),
                history,
                user_role: self.user_role.clone(),
            },
        }
    }

    fn reset(&mut self) {
        if let Some(abandoned) = self.in_flight.take() {
            tracing::debug!(session = %self.id, ticket = ?abandoned.ticket, "reset abandons pending call");
        }
        self.selected_document_type = None;
        self.document_questions.clear();
        self.client_data.clear();
        self.generated = None;
        self.phase = Phase::Idle;
        if self.panel == Panel::Document {
            self.panel = Panel::None;
        }
        self.say(ChatRole::System, RESET, RESET_CONTEXT);
    }

    fn issue(&mut self, kind: CallKind, resume: Phase) -> Ticket {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.in_flight = Some(InFlight {
            ticket,
            kind,
            resume,
        });
        ticket
    }

    fn push(&mut self, role: ChatRole, content: &str) {
        self.messages.push(TranscriptEntry {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Append to the transcript and record `context` in the chat history.
    fn say(&mut self, role: ChatRole, content: &str, context: &str) {
        self.push(role, content);
        self.history.push(ChatTurn::new(role, context));
    }
}

fn phase_name(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "idle",
        Phase::AwaitingAnswer { .. } => "awaiting an answer",
        Phase::ReadyToGenerate => "ready to generate",
        Phase::Generating => "generating",
        Phase::Generated => "generated",
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn question(id: &str, text: &str) -> DocumentQuestion {
        DocumentQuestion {
            id: id.to_string(),
            text: text.to_string(),
        }
    }

    fn select(session: &mut AssistantSession, document_type: &str) -> PendingCall {
        session
            .apply(AssistantEvent::SelectDocumentType {
                document_type: document_type.to_string(),
            })
            .expect("select accepted")
            .expect("questions call")
    }

    fn say(session: &mut AssistantSession, text: &str) -> Option<PendingCall> {
        session
            .apply(AssistantEvent::Message {
                text: text.to_string(),
            })
            .expect("message accepted")
    }

    fn payload(content: &str) -> GeneratedPayload {
        GeneratedPayload {
            contenido_base64: content.to_string(),
            formato: DocumentFormat::Pdf,
            message: None,
        }
    }

    /// Session that has loaded `questions` for "Carta de Invitación".
    fn with_questions(questions: Vec<DocumentQuestion>) -> AssistantSession {
        let mut session = AssistantSession::new("client");
        let call = select(&mut session, "Carta de Invitación");
        assert!(session.resolve(call.ticket(), CallOutcome::Questions(Ok(questions))));
        session
    }

    fn failure() -> UpstreamError {
        UpstreamError::Status {
            service: "document service",
            status: 500,
        }
    }

    #[test]
    fn new_session_starts_idle_with_welcome() {
        let session = AssistantSession::new("client");
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].content, WELCOME);
        assert_eq!(session.messages()[0].role, ChatRole::System);
    }

    #[test]
    fn selecting_a_type_asks_the_first_question_once() {
        let mut session = AssistantSession::new("client");
        let call = select(&mut session, "Carta de Invitación");
        let PendingCall::Questions { document_type, .. } = &call else {
            panic!("expected questions call, got {call:?}");
        };
        assert_eq!(document_type, "Carta de Invitación");
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.is_busy());

        let before = session.messages().len();
        session.resolve(
            call.ticket(),
            CallOutcome::Questions(Ok(vec![
                question("name", "¿Nombre del invitado?"),
                question("date", "¿Fecha de la visita?"),
            ])),
        );

        assert_eq!(session.phase(), Phase::AwaitingAnswer { index: 0 });
        assert_eq!(session.panel(), Panel::Document);
        let appended = &session.messages()[before..];
        let assistant: Vec<_> = appended
            .iter()
            .filter(|m| m.role == ChatRole::Assistant)
            .collect();
        assert_eq!(assistant.len(), 1);
        assert_eq!(assistant[0].content, "¿Nombre del invitado?");
        assert_eq!(
            session.messages()[1].content,
            "Quiero generar un documento de tipo \"Carta de Invitación\""
        );
    }

    #[test]
    fn answering_every_question_reaches_ready() {
        let mut session = with_questions(vec![
            question("name", "¿Nombre?"),
            question("date", "¿Fecha?"),
            question("city", "¿Ciudad?"),
        ]);

        assert!(say(&mut session, "Juan Pérez").is_none());
        assert_eq!(session.phase(), Phase::AwaitingAnswer { index: 1 });
        assert!(say(&mut session, "2025-05-01").is_none());
        assert_eq!(session.phase(), Phase::AwaitingAnswer { index: 2 });
        assert!(say(&mut session, "Miami").is_none());

        assert_eq!(session.phase(), Phase::ReadyToGenerate);
        let keys: Vec<_> = session.client_data().keys().cloned().collect();
        assert_eq!(keys, vec!["city", "date", "name"]);
        assert_eq!(
            session.messages().last().map(|m| m.content.as_str()),
            Some(READY_PROMPT)
        );
    }

    #[test]
    fn confirmation_fires_one_generation_and_stores_the_document() {
        let mut session = with_questions(vec![question("name", "¿Nombre del invitado?")]);
        assert!(say(&mut session, "Juan Pérez").is_none());
        assert_eq!(session.phase(), Phase::ReadyToGenerate);

        let call = say(&mut session, "sí, adelante").expect("generation call");
        let PendingCall::Generate { request, .. } = &call else {
            panic!("expected generation call, got {call:?}");
        };
        assert_eq!(request.document_type, "Carta de Invitación");
        assert_eq!(request.respuesta_formato, "json_base64");
        assert_eq!(
            request.client_data,
            BTreeMap::from([("name".to_string(), "Juan Pérez".to_string())])
        );
        assert_eq!(session.phase(), Phase::Generating);

        assert!(matches!(
            session.apply(AssistantEvent::Generate),
            Err(AssistantError::Busy)
        ));

        assert!(session.resolve(call.ticket(), CallOutcome::Generate(Ok(payload("SG9sYQ==")))));
        assert_eq!(session.phase(), Phase::Generated);
        let generated = session.generated().expect("document stored");
        assert_eq!(generated.base64, "SG9sYQ==");
        assert_eq!(generated.file_name(), "Carta_de_Invitación.pdf");
        assert_eq!(
            session.snapshot().document.map(|d| d.file_name),
            Some("Carta_de_Invitación.pdf".to_string())
        );
    }

    #[test]
    fn failed_generation_keeps_flow_state_and_apologises_once() {
        let mut session = with_questions(vec![question("name", "¿Nombre?")]);
        say(&mut session, "Juan Pérez");
        let call = session
            .apply(AssistantEvent::Generate)
            .expect("generate accepted")
            .expect("generation call");
        let before = session.messages().len();

        session.resolve(call.ticket(), CallOutcome::Generate(Err(failure())));

        assert_eq!(session.phase(), Phase::ReadyToGenerate);
        assert_eq!(session.selected_document_type(), Some("Carta de Invitación"));
        assert_eq!(
            session.client_data().get("name").map(String::as_str),
            Some("Juan Pérez")
        );
        assert!(session.generated().is_none());
        let appended: Vec<_> = session.messages()[before..]
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(appended, vec![GENERATE_ERROR]);
    }

    #[test]
    fn missing_content_is_treated_as_failure() {
        let mut session = with_questions(vec![question("name", "¿Nombre?")]);
        say(&mut session, "Juan");
        let call = say(&mut session, "generar").expect("generation call");
        session.resolve(
            call.ticket(),
            CallOutcome::Generate(Err(UpstreamError::MissingContent {
                service: "document service",
                field: "contenido_base64",
            })),
        );
        assert_eq!(session.phase(), Phase::ReadyToGenerate);
        assert!(session.generated().is_none());
    }

    #[test]
    fn reset_clears_flow_state_unconditionally() {
        let mut session = with_questions(vec![question("name", "¿Nombre?")]);
        say(&mut session, "Juan");
        let call = say(&mut session, "sí").expect("generation call");
        session.resolve(call.ticket(), CallOutcome::Generate(Ok(payload("SG9sYQ=="))));

        session.apply(AssistantEvent::Reset).expect("reset");

        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.selected_document_type(), None);
        assert!(session.document_questions().is_empty());
        assert!(session.client_data().is_empty());
        assert!(session.generated().is_none());
        assert_eq!(
            session.messages().last().map(|m| m.content.as_str()),
            Some(RESET)
        );
        assert_eq!(
            session.history().last(),
            Some(&ChatTurn::new(ChatRole::System, RESET_CONTEXT))
        );
    }

    #[test]
    fn reset_during_a_call_discards_its_outcome() {
        let mut session = AssistantSession::new("client");
        let call = select(&mut session, "Declaration Template");
        session.apply(AssistantEvent::Reset).expect("reset allowed while busy");
        assert!(!session.is_busy());

        let applied = session.resolve(
            call.ticket(),
            CallOutcome::Questions(Ok(vec![question("q", "¿Q?")])),
        );
        assert!(!applied);
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.selected_document_type(), None);
    }

    #[test]
    fn busy_session_rejects_other_events() {
        let mut session = AssistantSession::new("client");
        let _call = say(&mut session, "¿Qué es el asilo?").expect("chat call");
        let err = session
            .apply(AssistantEvent::Message {
                text: "¿hola?".to_string(),
            })
            .expect_err("second message while busy");
        assert!(matches!(err, AssistantError::Busy));
    }

    #[test]
    fn failed_question_fetch_leaves_state_unchanged() {
        let mut session = AssistantSession::new("client");
        let call = select(&mut session, "Carta de Invitación");
        session.resolve(call.ticket(), CallOutcome::Questions(Ok(Vec::new())));

        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.selected_document_type(), None);
        assert_eq!(
            session.messages().last().map(|m| m.content.as_str()),
            Some(QUESTIONS_ERROR)
        );
        assert!(!session.is_busy());
    }

    #[test]
    fn news_keywords_open_the_news_panel_in_any_phase() {
        let mut session = with_questions(vec![question("name", "¿Nombre?")]);
        assert!(say(&mut session, "¿Hay novedades de USCIS?").is_none());
        assert_eq!(session.panel(), Panel::News);
        assert_eq!(session.phase(), Phase::AwaitingAnswer { index: 0 });
        assert!(session.client_data().is_empty());
        assert_eq!(
            session.messages().last().map(|m| m.content.as_str()),
            Some(NEWS_OPENED)
        );
    }

    #[test]
    fn free_text_naming_a_type_selects_it() {
        let mut session = AssistantSession::new("client");
        let call = say(&mut session, "Necesito un BIA Appeal Brief urgente").expect("call");
        let PendingCall::Questions { document_type, .. } = call else {
            panic!("expected questions call");
        };
        assert_eq!(document_type, "BIA Appeal Brief");
    }

    #[test]
    fn chat_request_excludes_current_message_from_history() {
        let mut session = AssistantSession::new("lawyer");
        let call = say(&mut session, "¿Cuánto tarda un I-130?").expect("chat call");
        let PendingCall::Chat { ticket, request } = call else {
            panic!("expected chat call");
        };
        assert_eq!(request.message, "¿Cuánto tarda un I-130?");
        assert_eq!(request.user_role, "lawyer");
        assert!(
            !request
                .history
                .iter()
                .any(|turn| turn.content == "¿Cuánto tarda un I-130?")
        );

        session.resolve(ticket, CallOutcome::Chat(Ok("Depende de la categoría.".to_string())));
        assert_eq!(
            session.history().last(),
            Some(&ChatTurn::new(ChatRole::Assistant, "Depende de la categoría."))
        );
    }

    #[test]
    fn chat_failure_appends_one_apology() {
        let mut session = AssistantSession::new("client");
        let call = say(&mut session, "hola").expect("chat call");
        let before = session.messages().len();
        session.resolve(
            call.ticket(),
            CallOutcome::Chat(Err(UpstreamError::NotConfigured {
                service: "chat service",
            })),
        );
        assert_eq!(session.messages().len(), before + 1);
        assert_eq!(session.messages()[before].content, CHAT_ERROR);
    }

    #[test]
    fn generate_is_rejected_before_questions_are_answered() {
        let mut session = with_questions(vec![question("name", "¿Nombre?")]);
        let err = session
            .apply(AssistantEvent::Generate)
            .expect_err("not ready yet");
        assert!(matches!(err, AssistantError::InvalidTransition(_)));
    }

    #[test]
    fn blank_messages_are_ignored() {
        let mut session = AssistantSession::new("client");
        assert!(say(&mut session, "   ").is_none());
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn toggle_news_and_set_format() {
        let mut session = AssistantSession::new("client");
        session.apply(AssistantEvent::ToggleNews).expect("toggle");
        assert_eq!(session.panel(), Panel::News);
        session.apply(AssistantEvent::ToggleNews).expect("toggle");
        assert_eq!(session.panel(), Panel::None);

        session
            .apply(AssistantEvent::SetFormat {
                format: DocumentFormat::Docx,
            })
            .expect("format");
        assert_eq!(session.format(), DocumentFormat::Docx);
    }

    #[test]
    fn events_deserialize_from_tagged_json() {
        let event: AssistantEvent = serde_json::from_value(serde_json::json!({
            "type": "select_document_type",
            "document_type": "Declaration Template"
        }))
        .expect("parse");
        assert_eq!(
            event,
            AssistantEvent::SelectDocumentType {
                document_type: "Declaration Template".to_string()
            }
        );
        let reset: AssistantEvent =
            serde_json::from_value(serde_json::json!({"type": "reset"})).expect("parse");
        assert_eq!(reset, AssistantEvent::Reset);
    }
}
