//! Document catalogue and the generated document held by a session.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::Serialize;

use crate::upstream::DocumentFormat;

/// Document types offered by the generation service.
pub const DOCUMENT_TYPES: &[&str] = &[
    "I-589 Asylum Application Brief",
    "I-601 Waiver Brief (Extreme Hardship)",
    "I-130 Family Petition Brief",
    "Declaration Template",
    "Country Conditions Report",
    "I-751 Joint Filing Waiver Brief",
    "I-485 Adjustment of Status Brief",
    "VAWA Self-Petition Brief",
    "U Visa Application Brief",
    "T Visa Application Brief",
    "Cancellation of Removal Brief",
    "Motion to Reopen Brief",
    "BIA Appeal Brief",
    "Naturalization Application Brief",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DocumentCategory {
    pub id: &'static str,
    pub name: &'static str,
}

pub const DOCUMENT_CATEGORIES: &[DocumentCategory] = &[
    DocumentCategory { id: "asylum", name: "Asilo" },
    DocumentCategory { id: "family", name: "Familia" },
    DocumentCategory { id: "humanitarian", name: "Humanitario" },
    DocumentCategory { id: "deportation", name: "Deportación" },
    DocumentCategory { id: "waivers", name: "Waivers" },
    DocumentCategory { id: "naturalization", name: "Naturalización" },
    DocumentCategory { id: "employment", name: "Empleo" },
    DocumentCategory { id: "appeals", name: "Apelaciones" },
    DocumentCategory { id: "evidence", name: "Documentación de evidencia" },
    DocumentCategory { id: "country", name: "Específicos por país" },
    DocumentCategory { id: "vulnerable", name: "Poblaciones vulnerables" },
    DocumentCategory { id: "administrative", name: "Administrativos" },
    DocumentCategory { id: "post", name: "Post-adjudicación" },
    DocumentCategory { id: "misc", name: "Misceláneos" },
];

/// A generated document, kept only in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub document_type: String,
    pub format: DocumentFormat,
    pub base64: String,
}

impl GeneratedDocument {
    /// Whitespace runs in the document type become `_`.
    pub fn file_name(&self) -> String {
        let mut name = String::with_capacity(self.document_type.len() + 5);
        let mut in_space = false;
        for ch in self.document_type.chars() {
            if ch.is_whitespace() {
                if !in_space {
                    name.push('_');
                }
                in_space = true;
            } else {
                name.push(ch);
                in_space = false;
            }
        }
        name.push('.');
        name.push_str(self.format.as_str());
        name
    }

    pub fn content_type(&self) -> String {
        format!("application/{}", self.format.as_str())
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type(), self.base64)
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(self.base64.as_bytes())
    }
}
