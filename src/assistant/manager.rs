//! In-memory registry of assistant sessions and the driver that runs their
//! remote calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::session::{
    AssistantEvent, AssistantSession, CallOutcome, PendingCall, SessionSnapshot,
};
use super::{AssistantError, GeneratedDocument};
use crate::upstream::{Upstream, UpstreamError, chat};

const DEFAULT_ROLE: &str = "client";

pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<AssistantSession>>>>,
    upstream: Upstream,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(upstream: Upstream, ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            upstream,
            ttl,
        }
    }

    /// Open a session. The role is forwarded to the chat service and defaults
    /// to `client`.
    pub async fn create(&self, user_role: Option<&str>) -> SessionSnapshot {
        let role = user_role
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_ROLE)
            .to_lowercase();
        let session = AssistantSession::new(role);
        let snapshot = session.snapshot();
        self.sessions
            .write()
            .await
            .insert(snapshot.id, Arc::new(Mutex::new(session)));
        tracing::debug!(session = %snapshot.id, role = %snapshot.user_role, "assistant session created");
        snapshot
    }

    pub async fn snapshot(&self, id: Uuid) -> Result<SessionSnapshot, AssistantError> {
        let session = self.get(id).await?;
        let guard = session.lock().await;
        Ok(guard.snapshot())
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn document(&self, id: Uuid) -> Result<GeneratedDocument, AssistantError> {
        let session = self.get(id).await?;
        let guard = session.lock().await;
        guard.generated().cloned().ok_or(AssistantError::NoDocument)
    }

    /// Apply `event` and, if it needs one, perform the remote call before
    /// returning the resulting snapshot. The session lock is released while
    /// the call runs, so a concurrent `reset` is accepted and the late
    /// outcome is dropped.
    pub async fn dispatch(
        &self,
        id: Uuid,
        event: AssistantEvent,
    ) -> Result<SessionSnapshot, AssistantError> {
        self.dispatch_limited(id, event, || true).await
    }

    /// Like [`dispatch`](Self::dispatch), but a chat completion only goes out
    /// when `allow_chat` grants it. Answers, confirmations and document calls
    /// never consult it. A refused chat is recorded as a failed turn and
    /// reported as [`AssistantError::RateLimited`].
    pub async fn dispatch_limited<F>(
        &self,
        id: Uuid,
        event: AssistantEvent,
        allow_chat: F,
    ) -> Result<SessionSnapshot, AssistantError>
    where
        F: FnOnce() -> bool + Send,
    {
        let session = self.get(id).await?;
        let pending = session.lock().await.apply(event)?;

        let Some(call) = pending else {
            let guard = session.lock().await;
            return Ok(guard.snapshot());
        };

        let ticket = call.ticket();
        if matches!(call, PendingCall::Chat { .. }) && !allow_chat() {
            session.lock().await.resolve(
                ticket,
                CallOutcome::Chat(Err(UpstreamError::RateLimited {
                    service: chat::SERVICE,
                })),
            );
            return Err(AssistantError::RateLimited);
        }

        let outcome = self.perform(call).await;
        let mut guard = session.lock().await;
        guard.resolve(ticket, outcome);
        Ok(guard.snapshot())
    }

    async fn perform(&self, call: PendingCall) -> CallOutcome {
        match call {
            PendingCall::Questions { document_type, .. } => {
                CallOutcome::Questions(self.upstream.documents.questions(&document_type).await)
            }
            PendingCall::Generate { request, .. } => {
                CallOutcome::Generate(self.upstream.documents.generate(&request).await)
            }
            PendingCall::Chat { request, .. } => {
                CallOutcome::Chat(self.upstream.chat.complete(&request).await)
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Arc<Mutex<AssistantSession>>, AssistantError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(AssistantError::UnknownSession(id))
    }

    /// Drop sessions idle for longer than the TTL. Sessions whose lock is
    /// held are in use and kept.
    ///
    /// Returns the number of sessions removed.
    pub async fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.sessions.write().await.retain(|_, session| {
            let idle = session
                .try_lock()
                .map(|s| now.saturating_duration_since(s.last_active()) > self.ttl)
                .unwrap_or(false);
            if idle {
                removed += 1;
            }
            !idle
        });
        if removed > 0 {
            tracing::debug!(removed, "evicted idle assistant sessions");
        }
        removed
    }

    /// Periodically evict idle sessions for as long as the manager lives.
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        let period = (self.ttl / 4).max(Duration::from_secs(15));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.evict_idle().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::assistant::session::{GENERATED, WELCOME};
    use crate::assistant::{Panel, Phase};
    use crate::upstream::{
        DocumentFormat, DocumentQuestion, DocumentService, GenerateRequest, GeneratedPayload,
        Unconfigured, UpstreamError,
    };

    #[derive(Default)]
    struct FakeDocuments {
        generated: AtomicUsize,
    }

    #[async_trait]
    impl DocumentService for FakeDocuments {
        async fn questions(
            &self,
            _document_type: &str,
        ) -> Result<Vec<DocumentQuestion>, UpstreamError> {
            Ok(vec![
                DocumentQuestion {
                    id: "1".to_string(),
                    text: "¿Nombre completo del solicitante?".to_string(),
                },
                DocumentQuestion {
                    id: "2".to_string(),
                    text: "¿País de origen?".to_string(),
                },
            ])
        }

        async fn generate(
            &self,
            request: &GenerateRequest,
        ) -> Result<GeneratedPayload, UpstreamError> {
            self.generated.fetch_add(1, Ordering::SeqCst);
            Ok(GeneratedPayload {
                contenido_base64: "JVBERi0xLjQ=".to_string(),
                formato: request.formato,
                message: None,
            })
        }
    }

    fn manager(documents: Arc<FakeDocuments>, ttl: Duration) -> SessionManager {
        SessionManager::new(
            Upstream {
                documents,
                chat: Arc::new(Unconfigured),
                news: Arc::new(Unconfigured),
            },
            ttl,
        )
    }

    async fn send(manager: &SessionManager, id: Uuid, text: &str) -> SessionSnapshot {
        manager
            .dispatch(
                id,
                AssistantEvent::Message {
                    text: text.to_string(),
                },
            )
            .await
            .expect("dispatch")
    }

    #[tokio::test]
    async fn full_document_flow_through_the_driver() {
        let documents = Arc::new(FakeDocuments::default());
        let manager = manager(documents.clone(), Duration::from_secs(600));
        let created = manager.create(Some("Client")).await;
        assert_eq!(created.user_role, "client");
        assert_eq!(created.messages[0].content, WELCOME);

        let snap = manager
            .dispatch(
                created.id,
                AssistantEvent::SelectDocumentType {
                    document_type: "Declaration Template".to_string(),
                },
            )
            .await
            .expect("select");
        assert_eq!(snap.phase, Phase::AwaitingAnswer { index: 0 });
        assert_eq!(snap.panel, Panel::Document);
        assert_eq!(
            snap.current_question.map(|q| q.text),
            Some("¿Nombre completo del solicitante?".to_string())
        );

        send(&manager, created.id, "Ana Martínez").await;
        let snap = send(&manager, created.id, "Colombia").await;
        assert_eq!(snap.phase, Phase::ReadyToGenerate);

        manager
            .dispatch(
                created.id,
                AssistantEvent::SetFormat {
                    format: DocumentFormat::Docx,
                },
            )
            .await
            .expect("format");
        let snap = send(&manager, created.id, "Sí, generar").await;
        assert_eq!(snap.phase, Phase::Generated);
        assert_eq!(
            snap.messages.last().map(|m| m.content.as_str()),
            Some(GENERATED)
        );
        assert_eq!(documents.generated.load(Ordering::SeqCst), 1);

        let doc = manager.document(created.id).await.expect("document");
        assert_eq!(doc.file_name(), "Declaration_Template.docx");
    }

    #[tokio::test]
    async fn chat_failure_through_unconfigured_service_apologises() {
        let manager = manager(Arc::new(FakeDocuments::default()), Duration::from_secs(600));
        let created = manager.create(None).await;
        let snap = send(&manager, created.id, "¿Qué es un TPS?").await;
        assert!(!snap.busy);
        assert_eq!(
            snap.messages.last().map(|m| m.content.as_str()),
            Some(crate::assistant::session::CHAT_ERROR)
        );
    }

    #[tokio::test]
    async fn refused_chat_does_not_block_intake_answers() {
        let manager = manager(Arc::new(FakeDocuments::default()), Duration::from_secs(600));
        let created = manager.create(None).await;
        let id = created.id;

        let err = manager
            .dispatch_limited(
                id,
                AssistantEvent::Message {
                    text: "¿Qué es un TPS?".to_string(),
                },
                || false,
            )
            .await
            .expect_err("chat refused");
        assert!(matches!(err, AssistantError::RateLimited));
        let snap = manager.snapshot(id).await.expect("snapshot");
        assert!(!snap.busy);
        assert_eq!(
            snap.messages.last().map(|m| m.content.as_str()),
            Some(crate::assistant::session::CHAT_ERROR)
        );

        manager
            .dispatch_limited(
                id,
                AssistantEvent::SelectDocumentType {
                    document_type: "Declaration Template".to_string(),
                },
                || false,
            )
            .await
            .expect("questions are not chat");
        for answer in ["Ana Martínez", "Colombia"] {
            manager
                .dispatch_limited(
                    id,
                    AssistantEvent::Message {
                        text: answer.to_string(),
                    },
                    || panic!("answers never consult the chat budget"),
                )
                .await
                .expect("answer");
        }
        let snap = manager.snapshot(id).await.expect("snapshot");
        assert_eq!(snap.phase, Phase::ReadyToGenerate);
        assert_eq!(snap.client_data.len(), 2);
    }

    #[tokio::test]
    async fn unknown_session_and_missing_document() {
        let manager = manager(Arc::new(FakeDocuments::default()), Duration::from_secs(600));
        let err = manager
            .snapshot(Uuid::new_v4())
            .await
            .expect_err("unknown");
        assert!(matches!(err, AssistantError::UnknownSession(_)));

        let created = manager.create(None).await;
        let err = manager.document(created.id).await.expect_err("no document");
        assert!(matches!(err, AssistantError::NoDocument));

        assert!(manager.remove(created.id).await);
        assert!(!manager.remove(created.id).await);
    }

    #[tokio::test]
    async fn evict_idle_drops_only_stale_sessions() {
        let manager = manager(Arc::new(FakeDocuments::default()), Duration::from_millis(20));
        manager.create(None).await;
        assert_eq!(manager.evict_idle().await, 0);

        tokio::time::sleep(Duration::from_millis(40)).await;
        let fresh = manager.create(None).await;
        assert_eq!(manager.evict_idle().await, 1);
        assert_eq!(manager.len().await, 1);
        assert!(manager.snapshot(fresh.id).await.is_ok());
    }
}
