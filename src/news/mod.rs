//! Immigration news feed: item shape, tab filters, and display helpers.

use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    pub link: String,
    pub published: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_content: Option<String>,
    /// `published` as a long Spanish date, filled in before items are served.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_label: Option<String>,
}

/// News source tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsKind {
    #[default]
    All,
    Ice,
    Uscis,
}

impl NewsKind {
    /// Unknown values select every source.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("ice") => Self::Ice,
            Some("uscis") => Self::Uscis,
            _ => Self::All,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Ice => "ice",
            Self::Uscis => "uscis",
        }
    }
}

/// USCIS item categories offered as filters.
pub const USCIS_CATEGORIES: &[(&str, &str)] = &[("alert", "Alertas"), ("news", "Noticias")];

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;

/// Clamp a requested page size into `1..=MAX_LIMIT`.
pub fn clamp_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

fn active(filter: Option<&str>) -> Option<&str> {
    filter
        .map(str::trim)
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("all"))
}

/// Apply the per-tab filter: ICE items narrow by state code, USCIS items by
/// category, and the `all` tab is never filtered.
pub fn filter_news(
    items: Vec<NewsItem>,
    kind: NewsKind,
    state: Option<&str>,
    category: Option<&str>,
) -> Vec<NewsItem> {
    match kind {
        NewsKind::All => items,
        NewsKind::Ice => match active(state) {
            Some(code) => items
                .into_iter()
                .filter(|item| {
                    item.state
                        .as_deref()
                        .is_some_and(|s| s.eq_ignore_ascii_case(code))
                })
                .collect(),
            None => items,
        },
        NewsKind::Uscis => match active(category) {
            Some(wanted) => items
                .into_iter()
                .filter(|item| item.category.as_deref() == Some(wanted))
                .collect(),
            None => items,
        },
    }
}

const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Fill in `published_label` on every item.
pub fn label_published(items: &mut [NewsItem]) {
    for item in items {
        item.published_label = Some(format_published(&item.published));
    }
}

/// Long Spanish date for a `published` value ("11 de marzo de 2024").
/// Unparseable input is returned unchanged.
pub fn format_published(published: &str) -> String {
    let date = DateTime::parse_from_rfc3339(published)
        .map(|dt| dt.date_naive())
        .or_else(|_| DateTime::parse_from_rfc2822(published).map(|dt| dt.date_naive()))
        .or_else(|_| NaiveDate::parse_from_str(published.get(..10).unwrap_or(published), "%Y-%m-%d"));
    match date {
        Ok(date) => format!(
            "{} de {} de {}",
            date.day(),
            MONTHS_ES[date.month0() as usize],
            date.year()
        ),
        Err(_) => published.to_string(),
    }
}

/// Two-letter code to state name, for the ICE state filter.
pub const US_STATES: &[(&str, &str)] = &[
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
];

pub fn state_name(code: &str) -> Option<&'static str> {
    US_STATES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code.trim()))
        .map(|(_, name)| *name)
}
