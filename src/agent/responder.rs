//! Response generation flows: fresh answers, feedback revisions, edit
//! commands, and discussion summarization. Output is unsigned; signing
//! happens at publication time.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;

use crate::agent::{prompt, LlmClient};
use crate::error::{AppError, Result};
use crate::platform::types::Item;
use crate::signature;
use crate::triage::CommentHistory;

static RELEVANCE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(IS_RELEVANT|NOT_RELEVANT)\b").expect("valid regex"));

const SUMMARY_SEPARATOR: &str = "\n====================================================\n";

pub struct Responder {
    llm: Arc<dyn LlmClient>,
    repo_full_name: String,
}

impl Responder {
    pub fn new(llm: Arc<dyn LlmClient>, repo_full_name: impl Into<String>) -> Self {
        Self {
            llm,
            repo_full_name: repo_full_name.into(),
        }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Fresh response for an item nobody has answered yet.
    pub async fn new_response(&self, item: &Item) -> Result<String> {
        let text = self
            .llm
            .complete(
                &prompt::new_response_system(&self.repo_full_name),
                &prompt::new_response_user(item),
            )
            .await?;
        Ok(signature::clean_response(&text))
    }

    /// Improved response built from the previous answer plus user feedback.
    pub async fn feedback_response(&self, item: &Item, history: &CommentHistory) -> Result<String> {
        let original = history
            .latest_bot_comment()
            .map(|c| c.body.clone())
            .ok_or_else(|| {
                AppError::Internal("Feedback flow requires a prior bot response".to_string())
            })?;
        let feedback = history
            .latest_non_bot_comment()
            .map(|c| c.body.clone())
            .ok_or_else(|| {
                AppError::Internal("Feedback flow requires a user comment".to_string())
            })?;

        let text = self
            .llm
            .complete(
                &prompt::feedback_system(&self.repo_full_name),
                &prompt::feedback_user(item, &original, &feedback),
            )
            .await?;
        Ok(signature::clean_response(&text))
    }

    /// Instruction for the external code-editing tool.
    pub async fn edit_command(
        &self,
        item: &Item,
        summarized_comments: Option<&str>,
    ) -> Result<String> {
        let text = self
            .llm
            .complete(
                &prompt::edit_command_system(&self.repo_full_name),
                &prompt::edit_command_user(item, summarized_comments),
            )
            .await?;
        Ok(signature::clean_response(&text))
    }

    /// Summarize every comment before the latest one, keeping only those
    /// the model judges relevant to it. Control tokens are stripped from
    /// the summaries; empty results are dropped.
    pub async fn summarize_relevant_comments(&self, history: &CommentHistory) -> Result<String> {
        let comments = history.comments();
        let Some((latest, earlier)) = comments.split_last() else {
            return Ok("No relevant comments found".to_string());
        };

        let mut summaries = Vec::new();
        for comment in earlier {
            let raw = self
                .llm
                .complete(
                    &prompt::comment_summary_system(),
                    &prompt::comment_summary_user(&latest.body, &comment.body),
                )
                .await?;

            if raw.contains("NOT_RELEVANT") {
                continue;
            }
            let cleaned = RELEVANCE_TOKEN_RE.replace_all(&raw, "").to_string();
            let cleaned = signature::clean_response(&cleaned);
            if has_content(&cleaned) {
                summaries.push(cleaned);
            }
        }

        if summaries.is_empty() {
            Ok("No relevant comments found".to_string())
        } else {
            Ok(summaries.join(SUMMARY_SEPARATOR))
        }
    }
}

/// True when the text holds something besides punctuation and control
/// tokens.
fn has_content(text: &str) -> bool {
    let stripped: String = text
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    !stripped.is_empty() && stripped != "terminate"
}
