//! IA Migrante document API: per-type intake questions and generation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use super::{UpstreamError, endpoint};

pub(crate) const SERVICE: &str = "document service";

/// Only base64-in-JSON responses are requested.
pub const RESPONSE_FORMAT: &str = "json_base64";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentQuestion {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub text: String,
}

/// Question ids arrive as strings or numbers depending on the template.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "question id must be a string or number, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Pdf,
    Docx,
}

impl DocumentFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }

    pub fn from_str_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }
}

/// Body of `POST /api/document/generate`. Field names are the API's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub document_type: String,
    pub formato: DocumentFormat,
    #[serde(default = "default_response_format")]
    pub respuesta_formato: String,
    #[serde(default)]
    pub client_data: BTreeMap<String, String>,
}

fn default_response_format() -> String {
    RESPONSE_FORMAT.to_string()
}

/// A successful generation: base64 content already checked to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedPayload {
    pub contenido_base64: String,
    pub formato: DocumentFormat,
    pub message: Option<String>,
}

#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Intake questions for a document type. An empty list is an error.
    async fn questions(&self, document_type: &str) -> Result<Vec<DocumentQuestion>, UpstreamError>;

    async fn generate(&self, request: &GenerateRequest) -> Result<GeneratedPayload, UpstreamError>;
}

#[derive(Debug, Deserialize)]
struct QuestionsResponse {
    #[serde(default)]
    questions: Option<Vec<DocumentQuestion>>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    contenido_base64: Option<String>,
    #[serde(default)]
    formato: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Validate a generation response body against the request that produced it.
fn accept_generated(
    body: GenerateResponse,
    requested: DocumentFormat,
) -> Result<GeneratedPayload, UpstreamError> {
    let content = body
        .contenido_base64
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(UpstreamError::MissingContent {
            service: SERVICE,
            field: "contenido_base64",
        })?;
    BASE64_STANDARD
        .decode(content.as_bytes())
        .map_err(|e| UpstreamError::Decode {
            service: SERVICE,
            reason: format!("contenido_base64: {e}"),
        })?;

    Ok(GeneratedPayload {
        contenido_base64: content,
        formato: body
            .formato
            .as_deref()
            .and_then(DocumentFormat::from_str_loose)
            .unwrap_or(requested),
        message: body.message,
    })
}

/// reqwest client for the IA Migrante API.
#[derive(Debug, Clone)]
pub struct IaMigranteClient {
    base: Url,
    http: reqwest::Client,
}

impl IaMigranteClient {
    pub fn new(base: Url, http: reqwest::Client) -> Self {
        Self { base, http }
    }
}

#[async_trait]
impl DocumentService for IaMigranteClient {
    async fn questions(&self, document_type: &str) -> Result<Vec<DocumentQuestion>, UpstreamError> {
        let mut url = endpoint(&self.base, "api/document/questions")?;
        url.query_pairs_mut().append_pair("type", document_type);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e))?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, document_type, "question lookup failed");
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
            });
        }

        let body: QuestionsResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e))?;
        match body.questions {
            Some(questions) if !questions.is_empty() => Ok(questions),
            _ => Err(UpstreamError::EmptyPayload { service: SERVICE }),
        }
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GeneratedPayload, UpstreamError> {
        let url = endpoint(&self.base, "api/document/generate")?;
        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e))?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, document_type = %request.document_type, "generation failed");
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e))?;
        accept_generated(body, request.formato)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn question_ids_accept_numbers() {
        let parsed: Vec<DocumentQuestion> =
            serde_json::from_str(r#"[{"id": 3, "text": "¿Edad?"}, {"id": "name", "text": "¿Nombre?"}]"#)
                .expect("parse");
        assert_eq!(parsed[0].id, "3");
        assert_eq!(parsed[1].id, "name");
    }

    #[test]
    fn generate_request_uses_api_field_names() {
        let request = GenerateRequest {
            document_type: "Carta de Invitación".to_string(),
            formato: DocumentFormat::Pdf,
            respuesta_formato: RESPONSE_FORMAT.to_string(),
            client_data: BTreeMap::from([("name".to_string(), "Juan Pérez".to_string())]),
        };
        assert_eq!(
            serde_json::to_value(&request).expect("serialize"),
            serde_json::json!({
                "document_type": "Carta de Invitación",
                "formato": "pdf",
                "respuesta_formato": "json_base64",
                "client_data": {"name": "Juan Pérez"}
            })
        );
    }

    #[test]
    fn missing_content_is_an_error() {
        let err = accept_generated(
            GenerateResponse {
                contenido_base64: None,
                formato: Some("pdf".into()),
                message: Some("ok".into()),
            },
            DocumentFormat::Pdf,
        )
        .expect_err("missing content");
        assert!(matches!(
            err,
            UpstreamError::MissingContent {
                field: "contenido_base64",
                ..
            }
        ));
    }

    #[test]
    fn invalid_base64_is_a_decode_error() {
        let err = accept_generated(
            GenerateResponse {
                contenido_base64: Some("%%%".into()),
                formato: None,
                message: None,
            },
            DocumentFormat::Docx,
        )
        .expect_err("bad base64");
        assert!(matches!(err, UpstreamError::Decode { .. }));
    }

    #[test]
    fn accepted_payload_falls_back_to_requested_format() {
        let payload = accept_generated(
            GenerateResponse {
                contenido_base64: Some("JVBERi0=".into()),
                formato: None,
                message: None,
            },
            DocumentFormat::Docx,
        )
        .expect("valid");
        assert_eq!(payload.formato, DocumentFormat::Docx);
        assert_eq!(payload.contenido_base64, "JVBERi0=");
    }
}
