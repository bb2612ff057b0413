//! Request message construction
//!
//! Builds the analyst system prompt from the registered datasets, the
//! greeting request sent once per session, and the one-time context
//! preface that introduces uploaded datasets to the agent.

use crate::transport::ChatMessage;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

const HEADER: &str = "You are a Business Analytics Agent. You analyze tabular data and respond with clear, concise insights.";

const DEMO_DATA: &str = "Data sources: Use the demo datasets (users, events, purchases).";

const UPLOADED_DATA_INTRO: &str =
    "Data sources: Use ONLY the uploaded datasets below. Ignore demo data.";

const TOOL_POLICY: &str = "Tool policy: Prefer business_insight first (one-sentence insight + small table). Use chartjs_data for simple bar/line charts. Offer sql_tutor only if the user asks for SQL help. Call stakeholder_suggest only after an insight/chart and the user seems ready to share. Keep streams short and professional. Never emit raw JSON to the user.";

const STYLE: &str = "Style: Be brief. One short paragraph plus a compact table when helpful. Ask a follow-up question.";

const CONTEXT_PREFACE_INTRO: &str =
    "Context: Use ONLY the uploaded datasets below for analysis. Ignore any demo/sample data.";

/// User turn that asks the agent for its opening message
pub const GREETING_INSTRUCTION: &str = "Send greeting message. Don't call any tools yet.";

/// Title and column names of a dataset the user has made available
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub title: String,
    pub columns: Vec<String>,
}

impl DatasetSummary {
    pub fn new(title: impl Into<String>, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            title: title.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

fn describe_datasets(datasets: &[DatasetSummary]) -> String {
    let mut out = String::new();
    for (i, dataset) in datasets.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let _ = write!(
            out,
            "Dataset: {}\nColumns: {}",
            dataset.title,
            dataset.columns.join(", ")
        );
    }
    out
}

/// Build the system prompt for the given datasets.
///
/// With no datasets the agent is pointed at the built-in demo data.
pub fn build_system_prompt(datasets: &[DatasetSummary]) -> String {
    let mut prompt = String::from(HEADER);
    prompt.push('\n');
    if datasets.is_empty() {
        prompt.push_str(DEMO_DATA);
    } else {
        prompt.push_str(UPLOADED_DATA_INTRO);
        prompt.push_str("\n\n");
        prompt.push_str(&describe_datasets(datasets));
    }
    prompt.push('\n');
    prompt.push_str(TOOL_POLICY);
    prompt.push('\n');
    prompt.push_str(STYLE);
    prompt
}

/// Messages for the opening greeting; none of them enter the transcript
pub fn greeting_messages(datasets: &[DatasetSummary]) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(build_system_prompt(datasets)),
        ChatMessage::user(GREETING_INSTRUCTION),
    ]
}

/// One-time preface listing uploaded datasets, `None` when there are none
pub fn upload_context_preface(datasets: &[DatasetSummary]) -> Option<ChatMessage> {
    if datasets.is_empty() {
        return None;
    }
    Some(ChatMessage::user(format!(
        "{CONTEXT_PREFACE_INTRO}\n\n{}",
        describe_datasets(datasets)
    )))
}
