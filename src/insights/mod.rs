//! Insights Panel State
//!
//! An ordered list of AI-generated insights with per-item feedback.
//! Items are addressed by index, so removal has to re-key the feedback map
//! to keep each vote attached to the insight it was cast on.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// A single natural-language insight
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsightItem {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
}

impl InsightItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sentiment: None,
        }
    }

    pub fn sentiment(mut self, sentiment: impl Into<String>) -> Self {
        self.sentiment = Some(sentiment.into());
        self
    }
}

/// Wire shapes the backend uses for insights
#[derive(Deserialize)]
#[serde(untagged)]
enum RawInsight {
    Text(String),
    Item {
        text: String,
        #[serde(default)]
        sentiment: Option<String>,
    },
    Legacy {
        insight: String,
        #[serde(default)]
        sentiment: Option<String>,
    },
    Other(Value),
}

impl From<RawInsight> for InsightItem {
    fn from(raw: RawInsight) -> Self {
        match raw {
            RawInsight::Text(text) => InsightItem::new(text),
            RawInsight::Item { text, sentiment } | RawInsight::Legacy {
                insight: text,
                sentiment,
            } => InsightItem { text, sentiment },
            RawInsight::Other(value) => InsightItem::new(value.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for InsightItem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawInsight::deserialize(deserializer).map(InsightItem::from)
    }
}

/// Extract an insight list from an insights response.
///
/// Accepts a bare array or an object carrying the list under one of the keys
/// the backend has used over time.
pub fn parse_insight_list(body: &Value) -> Vec<InsightItem> {
    const KEYS: [&str; 4] = [
        "insights",
        "general_insights",
        "general-insights",
        "additional_insights",
    ];

    let list = match body {
        Value::Array(_) => Some(body),
        Value::Object(map) => KEYS.iter().find_map(|k| map.get(*k)),
        _ => None,
    };

    match list {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| InsightItem::deserialize(item).ok())
            .filter(|item| !item.text.trim().is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Thumbs up / thumbs down on a single insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Up,
    Down,
}

/// Errors from insight list mutations
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InsightError {
    #[error("Insight index {index} out of range (list has {len} items)")]
    OutOfRange { index: usize, len: usize },
}

/// Ordered insight list with index-keyed feedback
#[derive(Debug, Clone, Default)]
pub struct InsightList {
    items: Vec<InsightItem>,
    feedback: BTreeMap<usize, Feedback>,
}

impl InsightList {
    pub fn new(items: Vec<InsightItem>) -> Self {
        Self {
            items,
            feedback: BTreeMap::new(),
        }
    }

    pub fn items(&self) -> &[InsightItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn feedback(&self, index: usize) -> Option<Feedback> {
        self.feedback.get(&index).copied()
    }

    pub fn feedback_map(&self) -> &BTreeMap<usize, Feedback> {
        &self.feedback
    }

    /// Append freshly generated insights; existing indices are untouched
    pub fn append(&mut self, more: impl IntoIterator<Item = InsightItem>) -> usize {
        let before = self.items.len();
        self.items.extend(more);
        self.items.len() - before
    }

    /// Remove the insight at `index`.
    ///
    /// Feedback above `index` shifts down by one, below it is unchanged, and
    /// feedback on the removed item is dropped.
    pub fn remove(&mut self, index: usize) -> Result<InsightItem, InsightError> {
        self.check(index)?;
        let removed = self.items.remove(index);

        let old = std::mem::take(&mut self.feedback);
        self.feedback = old
            .into_iter()
            .filter_map(|(k, v)| match k.cmp(&index) {
                std::cmp::Ordering::Less => Some((k, v)),
                std::cmp::Ordering::Equal => None,
                std::cmp::Ordering::Greater => Some((k - 1, v)),
            })
            .collect();

        Ok(removed)
    }

    /// Tag an insight. Setting the same value again clears it.
    pub fn set_feedback(
        &mut self,
        index: usize,
        feedback: Feedback,
    ) -> Result<Option<Feedback>, InsightError> {
        self.check(index)?;

        if self.feedback.get(&index) == Some(&feedback) {
            self.feedback.remove(&index);
            Ok(None)
        } else {
            self.feedback.insert(index, feedback);
            Ok(Some(feedback))
        }
    }

    /// Replace the whole list, dropping all feedback
    pub fn reset(&mut self, items: Vec<InsightItem>) {
        self.items = items;
        self.feedback.clear();
    }

    fn check(&self, index: usize) -> Result<(), InsightError> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(InsightError::OutOfRange {
                index,
                len: self.items.len(),
            })
        }
    }
}
