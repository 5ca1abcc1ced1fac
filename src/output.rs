//! Output types: what an extraction run produces.

use crate::pipeline::entities::EntityCategory;
use crate::prompts::{HOLDINGS_LABEL, OWNER_NAME_LABEL, PORTFOLIO_VALUE_LABEL};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// One holding row returned by the model.
///
/// The schema is whatever the model chose to return, keys included.
pub type HoldingRecord = serde_json::Map<String, serde_json::Value>;

/// A non-empty model answer for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// 0-based page index.
    pub page: usize,
    /// Entity category that made the page a candidate.
    pub category: EntityCategory,
    /// Raw model reply.
    pub answer: String,
}

/// The three extracted fields, always in this order.
///
/// A single-value field is `None` when no candidate page produced a
/// non-empty answer. It serialises as `""` so the rendered shape never
/// changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOutput {
    pub account_owner_name: Option<String>,
    pub portfolio_value: Option<String>,
    pub holdings: Vec<HoldingRecord>,
}

/// Value half of an [`OutputEntry`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Records(Vec<HoldingRecord>),
}

/// A labelled entry, rendered as a one-key JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputEntry {
    pub label: &'static str,
    pub value: FieldValue,
}

impl Serialize for OutputEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.label, &self.value)?;
        map.end()
    }
}

impl PipelineOutput {
    /// The fixed three-entry view: owner name, portfolio value, holdings.
    pub fn entries(&self) -> [OutputEntry; 3] {
        [
            OutputEntry {
                label: OWNER_NAME_LABEL,
                value: FieldValue::Text(self.account_owner_name.clone().unwrap_or_default()),
            },
            OutputEntry {
                label: PORTFOLIO_VALUE_LABEL,
                value: FieldValue::Text(self.portfolio_value.clone().unwrap_or_default()),
            },
            OutputEntry {
                label: HOLDINGS_LABEL,
                value: FieldValue::Records(self.holdings.clone()),
            },
        ]
    }
}

impl Serialize for PipelineOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries().serialize(serializer)
    }
}

/// Pages flagged per category, without any model call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceReport {
    pub page_count: usize,
    /// 0-based pages with at least one PERSON match, ascending.
    pub person_pages: Vec<usize>,
    /// 0-based pages with at least one MONEY match, ascending.
    pub money_pages: Vec<usize>,
}
