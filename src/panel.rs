//! Tool result panels
//!
//! Maps raw `tool_result` payloads onto display-ready panels. Each tool kind
//! has a presentability predicate; results failing it, and results from
//! tools outside the known set, produce no panel at all.

mod table;

pub use table::Table;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tools whose results are rendered as panels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    BusinessInsight,
    ChartjsData,
    SqlTutor,
    StakeholderSuggest,
    RunAnalysisPlan,
}

impl ToolKind {
    pub fn from_tool_name(name: &str) -> Option<Self> {
        match name {
            "business_insight" => Some(Self::BusinessInsight),
            "chartjs_data" => Some(Self::ChartjsData),
            "sql_tutor" => Some(Self::SqlTutor),
            "stakeholder_suggest" => Some(Self::StakeholderSuggest),
            "run_analysis_plan" => Some(Self::RunAnalysisPlan),
            _ => None,
        }
    }

    pub fn tool_name(self) -> &'static str {
        match self {
            Self::BusinessInsight => "business_insight",
            Self::ChartjsData => "chartjs_data",
            Self::SqlTutor => "sql_tutor",
            Self::StakeholderSuggest => "stakeholder_suggest",
            Self::RunAnalysisPlan => "run_analysis_plan",
        }
    }

    /// Whether `result` carries anything worth showing for this kind
    pub fn is_presentable(self, result: &Value) -> bool {
        match self {
            Self::BusinessInsight => insight_is_presentable(result),
            Self::ChartjsData => chart_is_presentable(result),
            Self::SqlTutor => sql_tutor_is_presentable(result),
            Self::StakeholderSuggest => stakeholder_is_presentable(result),
            Self::RunAnalysisPlan => analysis_plan_is_presentable(result),
        }
    }
}

/// Table name with its column names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaTable {
    pub table: String,
    pub columns: Vec<String>,
}

/// Person the analysis could be shared with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stakeholder {
    pub role: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Display-ready projection of a tool result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolPanel {
    BusinessInsight {
        insight: Option<String>,
        table: Option<Table>,
    },
    ChartjsData {
        /// Chart.js configuration, passed through untouched
        chartjs: Value,
    },
    SqlTutor {
        tips: Vec<String>,
        schema: Vec<SchemaTable>,
        examples: Vec<String>,
    },
    StakeholderSuggest {
        suggestions: Vec<Stakeholder>,
        prompt: Option<String>,
    },
    RunAnalysisPlan {
        table: Option<Table>,
        python_code: Option<String>,
    },
}

impl ToolPanel {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolPanel::BusinessInsight { .. } => ToolKind::BusinessInsight,
            ToolPanel::ChartjsData { .. } => ToolKind::ChartjsData,
            ToolPanel::SqlTutor { .. } => ToolKind::SqlTutor,
            ToolPanel::StakeholderSuggest { .. } => ToolKind::StakeholderSuggest,
            ToolPanel::RunAnalysisPlan { .. } => ToolKind::RunAnalysisPlan,
        }
    }

    /// Tabular part of the panel, if it has one
    pub fn table(&self) -> Option<&Table> {
        match self {
            ToolPanel::BusinessInsight { table, .. } | ToolPanel::RunAnalysisPlan { table, .. } => {
                table.as_ref()
            }
            _ => None,
        }
    }
}

/// Turn a tool result into a panel, or `None` when it should not be shown
pub fn normalize_tool_result(name: &str, result: &Value) -> Option<ToolPanel> {
    let Some(kind) = ToolKind::from_tool_name(name) else {
        tracing::debug!(tool = name, "No panel for unknown tool");
        return None;
    };
    if !kind.is_presentable(result) {
        tracing::debug!(tool = name, "Dropping empty tool result");
        return None;
    }

    let panel = match kind {
        ToolKind::BusinessInsight => ToolPanel::BusinessInsight {
            insight: insight_text(result.get("insight")),
            table: declared_table(result),
        },
        ToolKind::ChartjsData => ToolPanel::ChartjsData {
            chartjs: result.get("chartjs").cloned().unwrap_or(Value::Null),
        },
        ToolKind::SqlTutor => ToolPanel::SqlTutor {
            tips: strings(result.get("tips")),
            schema: schema_tables(result.get("schema")),
            examples: strings(result.get("examples")),
        },
        ToolKind::StakeholderSuggest => ToolPanel::StakeholderSuggest {
            suggestions: result
                .get("suggestions")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(stakeholder).collect())
                .unwrap_or_default(),
            prompt: non_empty_str(result.get("prompt")).map(str::to_string),
        },
        ToolKind::RunAnalysisPlan => ToolPanel::RunAnalysisPlan {
            table: declared_table(result),
            python_code: non_empty_str(result.get("python_code")).map(str::to_string),
        },
    };
    Some(panel)
}

// ============================================================================
// Presentability predicates
// ============================================================================

/// Non-blank insight text, or columns with rows under `rows` or `data`
pub fn insight_is_presentable(result: &Value) -> bool {
    let has_insight = insight_text(result.get("insight")).is_some();
    let has_columns = array_len(result.get("columns")) > 0;
    let has_rows = array_len(result.get("rows")) > 0 || array_len(result.get("data")) > 0;
    has_insight || (has_columns && has_rows)
}

/// A chart configuration object must be present; its contents are not checked
pub fn chart_is_presentable(result: &Value) -> bool {
    result.get("chartjs").is_some_and(Value::is_object)
}

/// Some tips or examples, or a non-empty schema mapping
pub fn sql_tutor_is_presentable(result: &Value) -> bool {
    let entries = array_len(result.get("tips")) + array_len(result.get("examples"));
    let has_schema = result
        .get("schema")
        .and_then(Value::as_object)
        .is_some_and(|schema| !schema.is_empty());
    entries > 0 || has_schema
}

/// At least one suggestion, or a suggested prompt
pub fn stakeholder_is_presentable(result: &Value) -> bool {
    array_len(result.get("suggestions")) > 0 || non_empty_str(result.get("prompt")).is_some()
}

/// Columns together with rows, or generated code
pub fn analysis_plan_is_presentable(result: &Value) -> bool {
    let has_table = array_len(result.get("columns")) > 0 && array_len(result.get("rows")) > 0;
    has_table || non_empty_str(result.get("python_code")).is_some()
}

// ============================================================================
// Field helpers
// ============================================================================

fn array_len(value: Option<&Value>) -> usize {
    value.and_then(Value::as_array).map_or(0, Vec::len)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Strings, numbers and booleans render as insight text; blank text counts as none
fn insight_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.clone(),
        scalar @ (Value::Number(_) | Value::Bool(_)) => scalar.to_string(),
        _ => return None,
    };
    (!text.trim().is_empty()).then_some(text)
}

fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Table from explicit `columns` plus rows; absent when either side is empty
fn declared_table(result: &Value) -> Option<Table> {
    if !result.get("columns").is_some_and(Value::is_array) {
        return None;
    }
    Table::from_value(result).filter(|table| !table.is_empty())
}

fn schema_tables(value: Option<&Value>) -> Vec<SchemaTable> {
    value
        .and_then(Value::as_object)
        .map(|schema| {
            schema
                .iter()
                .map(|(table, columns)| SchemaTable {
                    table: table.clone(),
                    columns: strings(Some(columns)),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn stakeholder(entry: &Value) -> Stakeholder {
    match entry {
        Value::Object(obj) => {
            let field = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
            Stakeholder {
                role: field("role"),
                name: field("name"),
                email: field("email"),
            }
        }
        Value::String(name) => Stakeholder {
            name: Some(name.clone()),
            ..Stakeholder::default()
        },
        _ => Stakeholder::default(),
    }
}
