//! Legal assistant: per-tab chat sessions that can walk a user through
//! generating an immigration document.

pub mod document;
pub mod intent;
pub mod manager;
pub mod session;

use thiserror::Error;
use uuid::Uuid;

pub use document::{DOCUMENT_CATEGORIES, DOCUMENT_TYPES, DocumentCategory, GeneratedDocument};
pub use manager::SessionManager;
pub use session::{
    AssistantEvent, AssistantSession, CallOutcome, Panel, PendingCall, Phase, SessionSnapshot,
};

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("a request is already in progress for this session")]
    Busy,

    #[error("too many chat messages, try again shortly")]
    RateLimited,

    #[error("assistant session {0} not found")]
    UnknownSession(Uuid),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("no generated document in this session")]
    NoDocument,

    #[error("generated document is not valid base64: {0}")]
    CorruptDocument(String),
}
