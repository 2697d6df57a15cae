//! Repository-level orchestration shell.
//!
//! Iterates all open items in a repository, one fully resolved before the
//! next is started. The local clone is shared by every workflow in the
//! pass; the sequential loop is what guarantees exclusive access to it.

use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::responder::Responder;
use crate::agent::LlmClient;
use crate::config::AppConfig;
use crate::editor::CodeEditor;
use crate::error::Result;
use crate::platform::types::RepoInfo;
use crate::platform::Platform;
use crate::workflow::{WorkflowOutcome, WorkflowRunner};
use crate::workspace::git;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub processed: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl PassSummary {
    pub fn record(&mut self, outcome: &WorkflowOutcome) {
        match outcome {
            WorkflowOutcome::Success { .. } => self.processed += 1,
            WorkflowOutcome::Skip { .. } => self.skipped += 1,
            WorkflowOutcome::Error { .. } => self.errored += 1,
        }
    }
}

pub struct RepositoryProcessor {
    platform: Arc<dyn Platform>,
    editor: Arc<dyn CodeEditor>,
    llm: Arc<dyn LlmClient>,
    config: AppConfig,
}

impl RepositoryProcessor {
    pub fn new(
        platform: Arc<dyn Platform>,
        editor: Arc<dyn CodeEditor>,
        llm: Arc<dyn LlmClient>,
        config: AppConfig,
    ) -> Self {
        Self {
            platform,
            editor,
            llm,
            config,
        }
    }

    /// One pass over every tracked repository. A failing repository is
    /// logged and does not stop the pass.
    pub async fn process_all(&self) {
        for repo_name in &self.config.repos {
            tracing::info!(repo = %repo_name, "Processing repository");
            match self.process_repository(repo_name).await {
                Ok(summary) => {
                    tracing::info!(
                        repo = %repo_name,
                        processed = summary.processed,
                        skipped = summary.skipped,
                        errored = summary.errored,
                        "Completed repository pass"
                    );
                }
                Err(e) => {
                    tracing::error!(repo = %repo_name, error = %e, "Repository pass failed");
                }
            }
        }
    }

    /// Process all open items in one repository sequentially.
    pub async fn process_repository(&self, repo_name: &str) -> Result<PassSummary> {
        let repo = self.platform.repo_info(repo_name).await?;
        let clone_path = self.clone_path(&repo.full_name);

        self.ensure_workspace(&repo, &clone_path).await?;

        let items = self.platform.list_open_items(repo_name).await?;
        tracing::info!(repo = %repo_name, count = items.len(), "Found open items");

        let runner = WorkflowRunner::new(
            Arc::clone(&self.platform),
            Arc::clone(&self.editor),
            Responder::new(Arc::clone(&self.llm), repo_name),
            repo.clone(),
            clone_path,
            self.config.github.trigger_label.clone(),
            self.config.github.token.clone(),
        );

        let mut summary = PassSummary::default();
        for item in items {
            // Each item fully resolves before the next starts; an error
            // outcome is terminal for the item, never for the pass.
            let outcome = runner.run(&item).await;
            match &outcome {
                WorkflowOutcome::Success { summary: text } => {
                    tracing::info!(item = item.number, kind = item.kind.label(), outcome = %text, "Processed");
                }
                WorkflowOutcome::Skip { reason } => {
                    tracing::info!(item = item.number, kind = item.kind.label(), reason = %reason, "Skipped");
                }
                WorkflowOutcome::Error { reason, .. } => {
                    tracing::error!(item = item.number, kind = item.kind.label(), reason = %reason, "Errored");
                }
            }
            summary.record(&outcome);
        }

        Ok(summary)
    }

    fn clone_path(&self, repo_full_name: &str) -> PathBuf {
        let safe_name = repo_full_name.replace('/', "__");
        self.config.workspace.base_dir.join(safe_name)
    }

    /// Clone on first sight, otherwise fetch; either way the pass starts
    /// from the default branch aligned to origin.
    async fn ensure_workspace(&self, repo: &RepoInfo, clone_path: &PathBuf) -> Result<()> {
        if clone_path.exists() {
            git::fetch_origin(clone_path, &self.config.github.token).await?;
        } else {
            if let Some(parent) = clone_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            git::clone(&repo.clone_url, clone_path, &self.config.github.token).await?;
        }

        git::checkout_clean(clone_path, &repo.default_branch).await?;
        Ok(())
    }
}
