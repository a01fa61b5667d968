//! Data Transfer Objects
//!
//! Request and response bodies exchanged with the dashboard backend.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::insights::InsightItem;

// ============================================
// CHAT DTOs
// ============================================

/// Body for `POST /chat` and `POST /chat/stream`
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub question: String,
    pub stream: bool,
}

/// Answer produced by the conversational BI workflow.
///
/// Returned whole by `POST /chat` and as the payload of the `final` stream
/// event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub sql_query: Option<String>,
    /// Row list, or the same list serialized into a string
    #[serde(default)]
    pub query_result: Option<Value>,
    #[serde(default)]
    pub final_answer: Option<String>,
    /// ECharts option, `{}` when the workflow chose not to chart
    #[serde(default)]
    pub visualization_data: Option<Value>,
}

impl ChatAnswer {
    pub fn answer_text(&self) -> &str {
        self.final_answer.as_deref().unwrap_or_default()
    }

    /// SQL text, if the workflow produced any
    pub fn sql(&self) -> Option<&str> {
        self.sql_query
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Result rows.
    ///
    /// A stringified result that does not parse to a JSON array yields `None`
    /// rather than failing the whole answer.
    pub fn rows(&self) -> Option<Vec<Value>> {
        match self.query_result.as_ref()? {
            Value::Array(rows) => Some(rows.clone()),
            Value::String(raw) if raw.trim().is_empty() => None,
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Array(rows)) => Some(rows),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(error = %e, "query_result is not valid JSON, ignoring");
                    None
                }
            },
            _ => None,
        }
    }

    /// Chart option supplied by the backend, ignoring empty objects
    pub fn chart(&self) -> Option<&Value> {
        match self.visualization_data.as_ref()? {
            Value::Object(map) if !map.is_empty() => self.visualization_data.as_ref(),
            _ => None,
        }
    }
}

// ============================================
// INSIGHT DTOs
// ============================================

/// Response of `POST /generate_more_insights`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoreInsightsResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub additional_insights: Vec<InsightItem>,
    #[serde(default)]
    pub existing_general_insights: Vec<InsightItem>,
    #[serde(default)]
    pub total_additional_insights: usize,
}

// ============================================
// UPLOAD DTOs
// ============================================

/// Response of `POST /upload_excel/`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadSummary {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "general-insights")]
    pub general_insights: Vec<InsightItem>,
    /// Per-supplier KPI tables, passed through untouched
    #[serde(default, rename = "Supplier-KPIs")]
    pub supplier_kpis: Value,
    #[serde(default)]
    pub ingestion: Value,
}

impl UploadSummary {
    /// Number of KPI rows written to the backend database
    pub fn upserted(&self) -> u64 {
        self.ingestion
            .get("upserted")
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}

// ============================================
// CHART BOOKMARK DTOs
// ============================================

/// A chart saved to a user's dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartBookmark {
    #[serde(default, deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub chart: Value,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Body for `POST /dashboard/add-chart`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChart {
    pub user_id: String,
    pub title: String,
    pub chart: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum ChartList {
    Bare(Vec<ChartBookmark>),
    Wrapped { charts: Vec<ChartBookmark> },
}

impl ChartList {
    pub(crate) fn into_vec(self) -> Vec<ChartBookmark> {
        match self {
            ChartList::Bare(charts) | ChartList::Wrapped { charts } => charts,
        }
    }
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

// ============================================
// MISC DTOs
// ============================================

/// Response of `GET /health`
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}
