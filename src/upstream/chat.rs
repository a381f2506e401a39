//! OpenAI-compatible chat completion client.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use super::prompt::render_system_prompt;
use super::{UpstreamError, endpoint};

pub(crate) const SERVICE: &str = "chat service";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Body of `POST /api/chat`. `history` excludes `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(rename = "userRole", default = "default_user_role")]
    pub user_role: String,
}

fn default_user_role() -> String {
    "client".to_string()
}

#[async_trait]
pub trait ChatService: Send + Sync {
    /// The assistant's reply text.
    async fn complete(&self, request: &ChatRequest) -> Result<String, UpstreamError>;
}

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: ChatRole,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionReply>,
}

#[derive(Debug, Deserialize)]
struct CompletionReply {
    content: Option<String>,
}

pub struct ChatCompletionsClient {
    base: Url,
    model: String,
    api_key: Option<SecretString>,
    firm_name: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for ChatCompletionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsClient")
            .field("base", &self.base.as_str())
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ChatCompletionsClient {
    pub fn new(
        base: Url,
        model: String,
        api_key: Option<SecretString>,
        firm_name: String,
        http: reqwest::Client,
    ) -> Self {
        Self {
            base,
            model,
            api_key,
            firm_name,
            http,
        }
    }
}

fn build_messages<'a>(system_prompt: &'a str, request: &'a ChatRequest) -> Vec<CompletionMessage<'a>> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(CompletionMessage {
        role: ChatRole::System,
        content: system_prompt,
    });
    messages.extend(request.history.iter().map(|turn| CompletionMessage {
        role: turn.role,
        content: turn.content.as_str(),
    }));
    messages.push(CompletionMessage {
        role: ChatRole::User,
        content: request.message.as_str(),
    });
    messages
}

fn reply_text(body: CompletionResponse) -> Result<String, UpstreamError> {
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|reply| reply.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(UpstreamError::MissingContent {
            service: SERVICE,
            field: "choices[0].message.content",
        })
}

#[async_trait]
impl ChatService for ChatCompletionsClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, UpstreamError> {
        let system_prompt = render_system_prompt(&self.firm_name, &request.user_role)
            .map_err(|reason| UpstreamError::Decode {
                service: SERVICE,
                reason,
            })?;
        let body = CompletionRequest {
            model: &self.model,
            messages: build_messages(&system_prompt, request),
            temperature: 0.3,
        };

        let url = endpoint(&self.base, "v1/chat/completions")?;
        let mut builder = self.http.post(url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }
        let response = builder
            .send()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e))?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, model = %self.model, "chat completion failed");
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
            });
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e))?;
        reply_text(body)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn chat_request_reads_camel_case_role() {
        let request: ChatRequest = serde_json::from_value(serde_json::json!({
            "message": "¿Qué es el I-130?",
            "history": [{"role": "assistant", "content": "Hola"}],
            "userRole": "lawyer"
        }))
        .expect("parse");
        assert_eq!(request.user_role, "lawyer");
        assert_eq!(request.history[0].role, ChatRole::Assistant);

        let minimal: ChatRequest =
            serde_json::from_value(serde_json::json!({"message": "hola"})).expect("parse");
        assert_eq!(minimal.user_role, "client");
        assert!(minimal.history.is_empty());
    }

    #[test]
    fn messages_wrap_history_between_system_and_user() {
        let request = ChatRequest {
            message: "¿Y el costo?".to_string(),
            history: vec![
                ChatTurn::new(ChatRole::User, "¿Qué es el asilo?"),
                ChatTurn::new(ChatRole::Assistant, "Es una protección..."),
            ],
            user_role: "client".to_string(),
        };
        let messages = build_messages("prompt", &request);
        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::System,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User
            ]
        );
        assert_eq!(messages[3].content, "¿Y el costo?");
    }

    #[test]
    fn empty_choice_is_missing_content() {
        let body: CompletionResponse =
            serde_json::from_value(serde_json::json!({"choices": [{"message": {"content": "  "}}]}))
                .expect("parse");
        assert!(matches!(
            reply_text(body),
            Err(UpstreamError::MissingContent { .. })
        ));

        let body: CompletionResponse =
            serde_json::from_value(serde_json::json!({"choices": [{"message": {"content": "Hola"}}]}))
                .expect("parse");
        assert_eq!(reply_text(body).expect("reply"), "Hola");
    }
}
