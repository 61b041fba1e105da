use chrono::Utc;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// MIME type sent for PDF uploads.
pub const PDF_MIME: &str = "application/pdf";
/// MIME type sent for Word uploads.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Response from the upload endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub document_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// A document previously uploaded to the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub file_name: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub file_type: String,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(default)]
    pub processed: Option<bool>,
}

/// An extracted ESG performance metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(default, deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub category: String,
    /// Target as displayed, may embed units (`"25%"`, `"$1.2M"`).
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub goal: String,
    /// Achieved value as displayed.
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub actual: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub rag_status: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub extracted_by: String,
}

/// Body for manually creating or updating a metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricInput {
    pub category: String,
    pub goal: String,
    pub actual: String,
    pub rag_status: String,
}

/// Red/Amber/Green performance indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RagStatus {
    Red,
    Amber,
    Green,
    Unknown,
}

/// Visual style class for a status badge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusStyle {
    Danger,
    Warning,
    Success,
    Neutral,
}

/// Source snippet supporting an answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub text: Option<String>,
    pub chunk_index: Option<i64>,
}

/// Whether the displayed verdict has been acknowledged by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSync {
    #[default]
    Synced,
    Pending,
    Failed,
}

/// One question/answer exchange
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaInteraction {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    /// `None` until a user marks the answer.
    pub validated: Option<bool>,
    pub created_at: Option<String>,
    #[serde(skip)]
    pub sync: ValidationSync,
}

/// Request body for the ask endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskRequest {
    pub document_id: String,
    pub question: String,
}

/// Request body for the validate endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationRequest {
    pub interaction_id: String,
    pub is_valid: bool,
}

impl RagStatus {
    /// Classify a free-text status, ignoring case and surrounding whitespace.
    pub fn parse(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "red" => RagStatus::Red,
            "amber" => RagStatus::Amber,
            "green" => RagStatus::Green,
            _ => RagStatus::Unknown,
        }
    }

    /// Badge style for this status
    pub fn style(self) -> StatusStyle {
        match self {
            RagStatus::Red => StatusStyle::Danger,
            RagStatus::Amber => StatusStyle::Warning,
            RagStatus::Green => StatusStyle::Success,
            RagStatus::Unknown => StatusStyle::Neutral,
        }
    }
}

impl StatusStyle {
    /// Lookup from a raw status string.
    pub fn for_status(status: &str) -> Self {
        RagStatus::parse(status).style()
    }

    /// Class name used by the renderer
    pub fn as_str(self) -> &'static str {
        match self {
            StatusStyle::Danger => "danger",
            StatusStyle::Warning => "warning",
            StatusStyle::Success => "success",
            StatusStyle::Neutral => "neutral",
        }
    }
}

impl Metric {
    /// Parsed RAG status
    pub fn rag(&self) -> RagStatus {
        RagStatus::parse(&self.rag_status)
    }

    /// Goal achievement as a percentage (`actual / goal * 100`).
    ///
    /// Not clamped. A zero or non-numeric goal gives a non-finite value,
    /// which callers must treat as "no data" rather than an error.
    pub fn achievement_percent(&self) -> f64 {
        let goal = parse_display_number(&self.goal);
        let actual = parse_display_number(&self.actual);
        actual / goal * 100.0
    }
}

impl MetricInput {
    /// Create a metric body
    pub fn new(
        category: impl Into<String>,
        goal: impl Into<String>,
        actual: impl Into<String>,
        rag_status: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            goal: goal.into(),
            actual: actual.into(),
            rag_status: rag_status.into(),
        }
    }
}

/// Extract a number from a display string such as `"25%"` or `"1,200 t"`.
///
/// Every character other than ASCII digits and `.` is dropped, then the
/// longest leading decimal literal is parsed. Returns NaN when no digits
/// remain.
pub fn parse_display_number(display: &str) -> f64 {
    let kept: String = display
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_digit = false;
    for (i, c) in kept.char_indices() {
        match c {
            '.' if !seen_dot => seen_dot = true,
            '.' => break,
            _ => seen_digit = true,
        }
        end = i + 1;
    }

    if !seen_digit {
        return f64::NAN;
    }
    kept[..end].parse().unwrap_or(f64::NAN)
}

impl Citation {
    /// Text to display, falling back to a 1-based position label.
    pub fn label(&self, index: usize) -> String {
        match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => format!("Citation {}", index + 1),
        }
    }

    fn from_value(value: &Value) -> Self {
        match value {
            Value::String(text) => Self {
                text: Some(text.clone()),
                chunk_index: None,
            },
            Value::Object(map) => Self {
                text: map.get("text").and_then(Value::as_str).map(String::from),
                chunk_index: map.get("chunk_index").and_then(Value::as_i64),
            },
            _ => Self {
                text: None,
                chunk_index: None,
            },
        }
    }
}

impl QaInteraction {
    /// Normalize a raw interaction object from the service.
    ///
    /// `interaction_id` takes precedence over `id`; when neither is present a
    /// temporary id is synthesized. A missing or non-array `citations` field
    /// becomes an empty list.
    pub fn from_response(value: &Value) -> ApiResult<Self> {
        let map = value.as_object().ok_or_else(|| ApiError::InvalidResponse {
            message: format!("expected interaction object, got {}", value_kind(value)),
        })?;

        let id = map
            .get("interaction_id")
            .and_then(id_from_value)
            .or_else(|| map.get("id").and_then(id_from_value))
            .unwrap_or_else(synthesize_interaction_id);

        let citations = match map.get("citations") {
            Some(Value::Array(items)) => items.iter().map(Citation::from_value).collect(),
            _ => Vec::new(),
        };

        let text = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Ok(Self {
            id,
            question: text("question"),
            answer: text("answer"),
            citations,
            validated: map.get("validated").and_then(Value::as_bool),
            created_at: map
                .get("created_at")
                .and_then(Value::as_str)
                .map(String::from),
            sync: ValidationSync::Synced,
        })
    }

    /// Normalize a history listing.
    pub fn list_from_response(value: &Value) -> ApiResult<Vec<Self>> {
        let items = value.as_array().ok_or_else(|| ApiError::InvalidResponse {
            message: format!("expected interaction list, got {}", value_kind(value)),
        })?;
        items.iter().map(Self::from_response).collect()
    }
}

impl AskRequest {
    /// Create an ask request
    pub fn new(document_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            question: question.into(),
        }
    }
}

impl ValidationRequest {
    /// Create a validation request
    pub fn new(interaction_id: impl Into<String>, is_valid: bool) -> Self {
        Self {
            interaction_id: interaction_id.into(),
            is_valid,
        }
    }
}

/// Client-side id for an interaction the service did not identify.
pub fn synthesize_interaction_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("temp-{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}

/// Accept ids sent as strings or numbers; empty strings count as absent.
fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn deserialize_flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    id_from_value(&value).ok_or_else(|| de::Error::custom("expected a string or numeric id"))
}

/// Columns the service may send as `null` read as empty text.
fn deserialize_nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
