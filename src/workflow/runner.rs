//! End-to-end execution of one workflow for one item.
//!
//! Cross-cutting contracts enforced here:
//! - the trigger is re-evaluated immediately before any mutation, so a
//!   workflow never acts on evidence that changed under it;
//! - publication is idempotent: text is cleaned, signed exactly once, and
//!   suppressed when identical to the latest comment;
//! - every path reduces to the same three-way `WorkflowOutcome`.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;

use crate::agent::responder::Responder;
use crate::editor::CodeEditor;
use crate::error::{AppError, Result};
use crate::platform::types::{CreatePullRequest, Item, ItemSummary, RepoInfo};
use crate::platform::Platform;
use crate::signature::{self, CommentOutcome};
use crate::triage::trigger::{self, TriggerContext, UNDER_DEVELOPMENT_LABEL};
use crate::triage::{CommentHistory, TriggerKind};
use crate::workflow::dispatch::dispatch;
use crate::workflow::types::{WorkflowKind, WorkflowOutcome};
use crate::workspace::BranchLifecycleManager;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid regex"));

pub struct WorkflowRunner {
    platform: Arc<dyn Platform>,
    editor: Arc<dyn CodeEditor>,
    responder: Responder,
    repo: RepoInfo,
    clone_path: PathBuf,
    trigger_label: String,
    github_token: String,
}

impl WorkflowRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Arc<dyn Platform>,
        editor: Arc<dyn CodeEditor>,
        responder: Responder,
        repo: RepoInfo,
        clone_path: PathBuf,
        trigger_label: String,
        github_token: String,
    ) -> Self {
        Self {
            platform,
            editor,
            responder,
            repo,
            clone_path,
            trigger_label,
            github_token,
        }
    }

    /// Run the workflow selected for this item. Errors are terminal for the
    /// item only: they are reported to the item as a signed comment and
    /// folded into the outcome, never re-raised.
    pub async fn run(&self, summary: &ItemSummary) -> WorkflowOutcome {
        match self.run_inner(summary).await {
            Ok(outcome) => outcome,
            Err(e) => self.report_error(summary.number, &e).await,
        }
    }

    async fn run_inner(&self, summary: &ItemSummary) -> Result<WorkflowOutcome> {
        let item = self
            .platform
            .get_item(&self.repo.full_name, summary.number)
            .await?;
        let history = CommentHistory::from_item(&item);

        if !self.is_eligible(&item) {
            return Ok(WorkflowOutcome::skip(format!(
                "{} #{} has no {} label or title marker",
                item.kind.label(),
                item.number,
                self.trigger_label
            )));
        }

        if has_unresolved_error(&history) {
            return Ok(WorkflowOutcome::skip(format!(
                "error already reported on {} #{}, waiting for human input",
                item.kind.label(),
                item.number
            )));
        }

        // Already acted, and nothing new arrived since. The PR-creation
        // comment is exempt: its follow-up evidence lives on the linked PR.
        if history.index_of_latest_bot_comment().is_some()
            && !history.has_user_feedback()
            && trigger::pr_creation_comment(&history).is_none()
        {
            return Ok(WorkflowOutcome::skip(format!(
                "{} #{} already has a response without new feedback",
                item.kind.label(),
                item.number
            )));
        }

        let (kind, linked_pr) = self.classify(&item, &history).await?;
        tracing::info!(
            item = item.number,
            trigger = kind.as_str(),
            "Trigger evaluated"
        );

        let Some(workflow) = dispatch(kind) else {
            return Ok(WorkflowOutcome::skip(format!(
                "no active trigger for {} #{}",
                item.kind.label(),
                item.number
            )));
        };

        match workflow {
            WorkflowKind::NewResponse => self.new_response(&item, &history).await,
            WorkflowKind::FeedbackResponse => self.feedback_response(&item, &history).await,
            WorkflowKind::GenerateEditCommand => self.generate_edit_command(&item, &history).await,
            WorkflowKind::DevelopIssue => self.develop_issue(&item, &history).await,
            WorkflowKind::PrCommentFollowup => self.pr_comment_followup(&item, linked_pr).await,
            WorkflowKind::StandalonePr => self.standalone_pr(&item, &history).await,
        }
    }

    fn is_eligible(&self, item: &Item) -> bool {
        item.labels.iter().any(|l| l == &self.trigger_label)
            || item.title.to_lowercase().contains(trigger::TITLE_MARKER)
    }

    /// Assemble the trigger snapshot and classify. When the item carries a
    /// PR-creation comment, the linked PR's comment history is fetched so
    /// the follow-up rule can see it.
    async fn classify(
        &self,
        item: &Item,
        history: &CommentHistory,
    ) -> Result<(TriggerKind, Option<u64>)> {
        let linked_pr_number =
            trigger::pr_creation_comment(history).and_then(|c| parse_pr_number(&c.body));

        let linked_history = match linked_pr_number {
            Some(number) => {
                let pr_item = self.platform.get_item(&self.repo.full_name, number).await?;
                Some(CommentHistory::from_item(&pr_item))
            }
            None => None,
        };

        let ctx = TriggerContext {
            kind: item.kind,
            history,
            linked_pr: linked_history.as_ref(),
        };

        Ok((trigger::evaluate(&ctx), linked_pr_number))
    }

    /// Re-evaluate immediately before mutating; generation takes long
    /// enough that the item may have moved on.
    async fn trigger_unchanged(&self, number: u64, expected: TriggerKind) -> Result<bool> {
        let item = self.platform.get_item(&self.repo.full_name, number).await?;
        let history = CommentHistory::from_item(&item);
        let (current, _) = self.classify(&item, &history).await?;
        if current != expected {
            tracing::info!(
                item = number,
                expected = expected.as_str(),
                current = current.as_str(),
                "Trigger changed during generation, skipping"
            );
        }
        Ok(current == expected)
    }

    /// Sign and post, unless the identical body is already the latest
    /// comment.
    async fn publish_signed(
        &self,
        number: u64,
        history: &CommentHistory,
        text: &str,
        outcome: CommentOutcome,
    ) -> Result<bool> {
        let body = signature::sign_response(text, self.responder.model(), outcome);
        if history.latest_comment().map(|c| c.body.as_str()) == Some(body.as_str()) {
            tracing::info!(item = number, "Identical comment already present, skipping");
            return Ok(false);
        }
        self.platform
            .post_comment(&self.repo.full_name, number, &body)
            .await?;
        Ok(true)
    }

    /// Convert a failure into an error outcome, reporting it to the item as
    /// a signed comment with a collapsible detail block. Deduplicated, so a
    /// retried failure never stacks identical reports.
    async fn report_error(&self, number: u64, err: &AppError) -> WorkflowOutcome {
        let (reason, detail) = match err {
            AppError::MultipleBranches {
                issue_number,
                branches,
            } => (
                format!("Multiple branches reference issue #{issue_number}; refusing to guess which one to use"),
                branches.join("\n"),
            ),
            other => (other.to_string(), format!("{other:?}")),
        };

        let text = format!(
            "ERROR: {reason}\n\n{}",
            details_block("Details", &detail)
        );

        match self.platform.get_item(&self.repo.full_name, number).await {
            Ok(item) => {
                let history = CommentHistory::from_item(&item);
                if let Err(post_err) = self
                    .publish_signed(number, &history, &text, CommentOutcome::Error)
                    .await
                {
                    tracing::error!(
                        item = number,
                        error = %post_err,
                        "Failed to post error comment"
                    );
                }
            }
            Err(fetch_err) => {
                tracing::error!(
                    item = number,
                    error = %fetch_err,
                    "Failed to fetch item for error report"
                );
            }
        }

        WorkflowOutcome::Error { reason, detail }
    }

    // --- Comment-only workflows ---

    async fn new_response(
        &self,
        item: &Item,
        history: &CommentHistory,
    ) -> Result<WorkflowOutcome> {
        let text = self.responder.new_response(item).await?;

        if !self
            .trigger_unchanged(item.number, TriggerKind::NewResponse)
            .await?
        {
            return Ok(WorkflowOutcome::skip("state changed during generation"));
        }

        if self
            .publish_signed(item.number, history, &text, CommentOutcome::Success)
            .await?
        {
            Ok(WorkflowOutcome::Success {
                summary: format!("Posted new response on #{}", item.number),
            })
        } else {
            Ok(WorkflowOutcome::skip("identical response already posted"))
        }
    }

    async fn feedback_response(
        &self,
        item: &Item,
        history: &CommentHistory,
    ) -> Result<WorkflowOutcome> {
        let text = self.responder.feedback_response(item, history).await?;

        if !self
            .trigger_unchanged(item.number, TriggerKind::UserFeedback)
            .await?
        {
            return Ok(WorkflowOutcome::skip("state changed during generation"));
        }

        if self
            .publish_signed(item.number, history, &text, CommentOutcome::Success)
            .await?
        {
            Ok(WorkflowOutcome::Success {
                summary: format!("Posted feedback response on #{}", item.number),
            })
        } else {
            Ok(WorkflowOutcome::skip("identical response already posted"))
        }
    }

    async fn generate_edit_command(
        &self,
        item: &Item,
        history: &CommentHistory,
    ) -> Result<WorkflowOutcome> {
        let command = self.responder.edit_command(item, None).await?;

        if !self
            .trigger_unchanged(item.number, TriggerKind::GenerateEditCommand)
            .await?
        {
            return Ok(WorkflowOutcome::skip("state changed during generation"));
        }

        let text = format!("Generated edit command:\n---\n{command}");
        if self
            .publish_signed(item.number, history, &text, CommentOutcome::Success)
            .await?
        {
            Ok(WorkflowOutcome::Success {
                summary: format!("Posted edit command on #{}", item.number),
            })
        } else {
            Ok(WorkflowOutcome::skip("identical response already posted"))
        }
    }

    // --- Code-editing workflows ---

    async fn develop_issue(
        &self,
        item: &Item,
        history: &CommentHistory,
    ) -> Result<WorkflowOutcome> {
        if history.has_label(UNDER_DEVELOPMENT_LABEL) {
            return Ok(WorkflowOutcome::skip(format!(
                "issue #{} is already under development",
                item.number
            )));
        }

        let mut mgr = BranchLifecycleManager::new(&self.clone_path, &self.repo.default_branch);

        // Surfaces branch ambiguity before any LLM spend
        mgr.resolve_or_create(item.number, &item.title, false)
            .await?;

        let instruction = self.responder.edit_command(item, None).await?;

        if !self
            .trigger_unchanged(item.number, TriggerKind::DevelopIssue)
            .await?
        {
            return Ok(WorkflowOutcome::skip("state changed during generation"));
        }

        let branch = mgr
            .resolve_or_create(item.number, &item.title, true)
            .await?
            .ok_or_else(|| {
                AppError::Internal("resolve_or_create with allow_create returned no branch".into())
            })?;
        mgr.checkout(&branch.name).await?;

        let result = self
            .develop_issue_steps(&mut mgr, item, &branch.name, &instruction)
            .await;

        match result {
            Ok(outcome) => {
                mgr.restore_default_branch().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = mgr.rollback(&branch.name, true).await {
                    tracing::error!(
                        branch = %branch.name,
                        error = %rollback_err,
                        "Rollback failed after workflow error"
                    );
                }
                Err(e)
            }
        }
    }

    async fn develop_issue_steps(
        &self,
        mgr: &mut BranchLifecycleManager,
        item: &Item,
        branch: &str,
        instruction: &str,
    ) -> Result<WorkflowOutcome> {
        let transcript = mgr
            .run_external_edit(self.editor.as_ref(), instruction)
            .await?;

        let push = mgr.push(branch, &self.github_token).await?;
        if !push.ok {
            return Err(AppError::Git(format!("Push rejected: {}", push.message)));
        }

        let pr = mgr
            .publish_pr(
                self.platform.as_ref(),
                &self.repo.full_name,
                &CreatePullRequest {
                    title: format!("Fix #{}: {}", item.number, item.title),
                    body: format!(
                        "Resolves #{}\n\nOpened by taproot from the issue discussion.",
                        item.number
                    ),
                    head_branch: branch.to_string(),
                    base_branch: self.repo.default_branch.clone(),
                },
            )
            .await?;

        let announce = format!(
            "{} {}\nContinue discussion there.",
            trigger::PR_CREATED_MARKER,
            pr.html_url
        );
        let announce = signature::sign_response(
            &announce,
            self.responder.model(),
            CommentOutcome::Success,
        );
        self.platform
            .post_comment(&self.repo.full_name, item.number, &announce)
            .await?;

        self.platform
            .add_label(&self.repo.full_name, item.number, UNDER_DEVELOPMENT_LABEL)
            .await?;

        let pr_comment = signature::sign_response(
            &format!(
                "Generated edit command:\n---\n{instruction}\n\n{}",
                details_block("Editor output", &transcript.stdout)
            ),
            self.responder.model(),
            CommentOutcome::Success,
        );
        mgr.comment_on_pr(
            self.platform.as_ref(),
            &self.repo.full_name,
            pr.number,
            &pr_comment,
        )
        .await?;

        Ok(WorkflowOutcome::Success {
            summary: format!("Created pull request #{} for issue #{}", pr.number, item.number),
        })
    }

    async fn pr_comment_followup(
        &self,
        item: &Item,
        linked_pr: Option<u64>,
    ) -> Result<WorkflowOutcome> {
        let pr_number = linked_pr.ok_or_else(|| {
            AppError::Internal("PR follow-up trigger without a parseable PR link".into())
        })?;

        let pr = self
            .platform
            .get_pull_request(&self.repo.full_name, pr_number)
            .await?;
        let pr_item = self
            .platform
            .get_item(&self.repo.full_name, pr_number)
            .await?;
        let pr_history = CommentHistory::from_item(&pr_item);

        let summary = self.responder.summarize_relevant_comments(&pr_history).await?;
        let instruction = self.responder.edit_command(item, Some(&summary)).await?;

        if !self
            .trigger_unchanged(item.number, TriggerKind::PrCommentFollowup)
            .await?
        {
            return Ok(WorkflowOutcome::skip("state changed during generation"));
        }

        let mut mgr = BranchLifecycleManager::new(&self.clone_path, &self.repo.default_branch);
        mgr.checkout(&pr.head_branch).await?;

        let result = self
            .edit_push_and_comment(&mut mgr, &pr.head_branch, pr_number, &instruction)
            .await;

        match result {
            Ok(()) => {
                mgr.restore_default_branch().await?;
                Ok(WorkflowOutcome::Success {
                    summary: format!(
                        "Applied follow-up changes on PR #{pr_number} for issue #{}",
                        item.number
                    ),
                })
            }
            Err(e) => {
                // The PR branch lives on the remote; never delete it here
                if let Err(rollback_err) = mgr.rollback(&pr.head_branch, false).await {
                    tracing::error!(
                        branch = %pr.head_branch,
                        error = %rollback_err,
                        "Rollback failed after workflow error"
                    );
                }
                Err(e)
            }
        }
    }

    async fn standalone_pr(
        &self,
        item: &Item,
        history: &CommentHistory,
    ) -> Result<WorkflowOutcome> {
        let pr = self
            .platform
            .get_pull_request(&self.repo.full_name, item.number)
            .await?;

        let summary = self.responder.summarize_relevant_comments(history).await?;
        let instruction = self.responder.edit_command(item, Some(&summary)).await?;

        if !self
            .trigger_unchanged(item.number, TriggerKind::StandalonePr)
            .await?
        {
            return Ok(WorkflowOutcome::skip("state changed during generation"));
        }

        let mut mgr = BranchLifecycleManager::new(&self.clone_path, &self.repo.default_branch);
        mgr.checkout(&pr.head_branch).await?;

        let result = self
            .edit_push_and_comment(&mut mgr, &pr.head_branch, item.number, &instruction)
            .await;

        match result {
            Ok(()) => {
                mgr.restore_default_branch().await?;
                Ok(WorkflowOutcome::Success {
                    summary: format!("Applied changes on PR #{}", item.number),
                })
            }
            Err(e) => {
                if let Err(rollback_err) = mgr.rollback(&pr.head_branch, false).await {
                    tracing::error!(
                        branch = %pr.head_branch,
                        error = %rollback_err,
                        "Rollback failed after workflow error"
                    );
                }
                Err(e)
            }
        }
    }

    /// Shared tail of the PR-editing workflows: run the editor, push, and
    /// leave a transcript comment on the PR.
    async fn edit_push_and_comment(
        &self,
        mgr: &mut BranchLifecycleManager,
        branch: &str,
        pr_number: u64,
        instruction: &str,
    ) -> Result<()> {
        let transcript = mgr
            .run_external_edit(self.editor.as_ref(), instruction)
            .await?;

        let push = mgr.push(branch, &self.github_token).await?;
        if !push.ok {
            return Err(AppError::Git(format!("Push rejected: {}", push.message)));
        }

        let body = signature::sign_response(
            &format!(
                "Applied changes based on the discussion.\n\n{}",
                details_block("Editor output", &transcript.stdout)
            ),
            self.responder.model(),
            CommentOutcome::Success,
        );
        mgr.comment_on_pr(self.platform.as_ref(), &self.repo.full_name, pr_number, &body)
            .await?;

        Ok(())
    }
}

fn details_block(title: &str, body: &str) -> String {
    format!("<details><summary>{title}</summary>\n\n```\n{body}\n```\n</details>")
}

/// Pull the PR number out of a "Created pull request: <url>" comment.
fn parse_pr_number(body: &str) -> Option<u64> {
    let url = URL_RE.find(body)?.as_str();
    let url = url.trim_end_matches(|c: char| !c.is_ascii_digit());
    url.rsplit('/').next()?.parse().ok()
}

fn has_unresolved_error(history: &CommentHistory) -> bool {
    let Some(idx) = history.index_of_latest_bot_comment() else {
        return false;
    };
    let latest_bot = &history.comments()[idx];
    signature::comment_meta(&latest_bot.body).outcome == CommentOutcome::Error
        && idx + 1 == history.comments().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::LlmClient;
    use crate::editor::EditorTranscript;
    use crate::platform::types::*;
    use crate::workspace::git::{self, testutil::{commit_all, init_repo_with_commit}};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;

    const REPO: &str = "owner/repo";

    struct MockPlatform {
        items: Mutex<HashMap<u64, Item>>,
        prs: Mutex<HashMap<u64, PullRequest>>,
        labels_added: Mutex<Vec<(u64, String)>>,
        next_pr_number: Mutex<u64>,
    }

    impl MockPlatform {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                items: Mutex::new(HashMap::new()),
                prs: Mutex::new(HashMap::new()),
                labels_added: Mutex::new(Vec::new()),
                next_pr_number: Mutex::new(100),
            })
        }

        fn insert_item(&self, item: Item) {
            self.items.lock().unwrap().insert(item.number, item);
        }

        fn comments_on(&self, number: u64) -> Vec<String> {
            self.items
                .lock()
                .unwrap()
                .get(&number)
                .map(|i| i.comments.iter().map(|c| c.body.clone()).collect())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl Platform for MockPlatform {
        async fn repo_info(&self, _repo: &str) -> crate::error::Result<RepoInfo> {
            unimplemented!("not used by runner tests")
        }

        async fn list_open_items(&self, _repo: &str) -> crate::error::Result<Vec<ItemSummary>> {
            unimplemented!("not used by runner tests")
        }

        async fn get_item(&self, _repo: &str, number: u64) -> crate::error::Result<Item> {
            Ok(self
                .items
                .lock()
                .unwrap()
                .get(&number)
                .cloned()
                .unwrap_or(Item {
                    number,
                    kind: ItemKind::PullRequest,
                    title: String::new(),
                    body: String::new(),
                    labels: vec![],
                    comments: vec![],
                }))
        }

        async fn post_comment(
            &self,
            _repo: &str,
            number: u64,
            body: &str,
        ) -> crate::error::Result<()> {
            let mut items = self.items.lock().unwrap();
            let item = items.entry(number).or_insert(Item {
                number,
                kind: ItemKind::PullRequest,
                title: String::new(),
                body: String::new(),
                labels: vec![],
                comments: vec![],
            });
            let id = item.comments.len() as u64 + 1;
            item.comments.push(Comment {
                id,
                author: "taproot[bot]".to_string(),
                body: body.to_string(),
                created_at: None,
            });
            Ok(())
        }

        async fn add_label(
            &self,
            _repo: &str,
            number: u64,
            label: &str,
        ) -> crate::error::Result<()> {
            self.labels_added
                .lock()
                .unwrap()
                .push((number, label.to_string()));
            if let Some(item) = self.items.lock().unwrap().get_mut(&number) {
                item.labels.push(label.to_string());
            }
            Ok(())
        }

        async fn get_pull_request(
            &self,
            _repo: &str,
            pr_number: u64,
        ) -> crate::error::Result<PullRequest> {
            self.prs
                .lock()
                .unwrap()
                .get(&pr_number)
                .cloned()
                .ok_or_else(|| AppError::GitHubApi(format!("No PR #{pr_number}")))
        }

        async fn create_pull_request(
            &self,
            _repo: &str,
            pr: &CreatePullRequest,
        ) -> crate::error::Result<PullRequest> {
            let mut next = self.next_pr_number.lock().unwrap();
            let number = *next;
            *next += 1;
            let created = PullRequest {
                number,
                title: pr.title.clone(),
                body: pr.body.clone(),
                head_branch: pr.head_branch.clone(),
                base_branch: pr.base_branch.clone(),
                html_url: format!("https://github.com/{REPO}/pull/{number}"),
            };
            self.prs.lock().unwrap().insert(number, created.clone());
            Ok(created)
        }
    }

    struct FixedLlm;

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _system: &str, _user: &str) -> crate::error::Result<String> {
            Ok("Generated text for the request.".to_string())
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    struct CommittingEditor;

    #[async_trait]
    impl CodeEditor for CommittingEditor {
        async fn run(
            &self,
            _instruction: &str,
            workdir: &Path,
        ) -> crate::error::Result<EditorTranscript> {
            fs::write(workdir.join("edit.txt"), "edited\n").unwrap();
            commit_all(workdir, "apply edit");
            Ok(EditorTranscript {
                stdout: "editor transcript".to_string(),
                stderr: String::new(),
            })
        }
    }

    struct NoopEditor;

    #[async_trait]
    impl CodeEditor for NoopEditor {
        async fn run(
            &self,
            _instruction: &str,
            _workdir: &Path,
        ) -> crate::error::Result<EditorTranscript> {
            Ok(EditorTranscript {
                stdout: "no edits".to_string(),
                stderr: String::new(),
            })
        }
    }

    struct Fixture {
        platform: Arc<MockPlatform>,
        runner: WorkflowRunner,
        _clone: tempfile::TempDir,
        _origin: tempfile::TempDir,
    }

    async fn fixture(editor: Arc<dyn CodeEditor>) -> Fixture {
        let clone = tempfile::tempdir().unwrap();
        init_repo_with_commit(clone.path());
        let default = git::current_branch(clone.path()).await.unwrap();

        let origin = tempfile::tempdir().unwrap();
        git2::Repository::init_bare(origin.path()).unwrap();
        {
            let repo = git2::Repository::open(clone.path()).unwrap();
            repo.remote("origin", origin.path().to_str().unwrap())
                .unwrap();
        }

        let platform = MockPlatform::new();
        let repo_info = RepoInfo {
            full_name: REPO.to_string(),
            clone_url: "https://example.invalid/owner/repo.git".to_string(),
            default_branch: default,
        };
        let runner = WorkflowRunner::new(
            Arc::clone(&platform) as Arc<dyn Platform>,
            editor,
            Responder::new(Arc::new(FixedLlm), REPO),
            repo_info,
            clone.path().to_path_buf(),
            "taproot".to_string(),
            "token".to_string(),
        );

        Fixture {
            platform,
            runner,
            _clone: clone,
            _origin: origin,
        }
    }

    fn issue(number: u64, title: &str, labels: Vec<&str>, comments: Vec<Comment>) -> Item {
        Item {
            number,
            kind: ItemKind::Issue,
            title: title.to_string(),
            body: "body".to_string(),
            labels: labels.into_iter().map(String::from).collect(),
            comments,
        }
    }

    fn item_summary(item: &Item) -> ItemSummary {
        ItemSummary {
            number: item.number,
            kind: item.kind,
            title: item.title.clone(),
            body: item.body.clone(),
            labels: item.labels.clone(),
        }
    }

    fn bot_comment(id: u64, text: &str) -> Comment {
        Comment {
            id,
            author: "taproot[bot]".to_string(),
            body: signature::sign_response(text, "test-model", CommentOutcome::Success),
            created_at: None,
        }
    }

    fn human_comment(id: u64, text: &str) -> Comment {
        Comment {
            id,
            author: "alice".to_string(),
            body: text.to_string(),
            created_at: None,
        }
    }

    #[test]
    fn test_parse_pr_number() {
        assert_eq!(
            parse_pr_number("Created pull request: https://github.com/o/r/pull/42\nContinue discussion there."),
            Some(42)
        );
        assert_eq!(parse_pr_number("no url here"), None);
        assert_eq!(
            parse_pr_number("Created pull request: https://github.com/o/r/pull/7."),
            Some(7)
        );
    }

    #[tokio::test]
    async fn test_unlabeled_item_is_skipped() {
        let f = fixture(Arc::new(NoopEditor)).await;
        let item = issue(1, "A bug", vec![], vec![]);
        f.platform.insert_item(item.clone());

        let outcome = f.runner.run(&item_summary(&item)).await;
        assert!(matches!(outcome, WorkflowOutcome::Skip { .. }));
        assert!(f.platform.comments_on(1).is_empty());
    }

    #[tokio::test]
    async fn test_answered_issue_without_feedback_is_skipped() {
        let f = fixture(Arc::new(NoopEditor)).await;
        let item = issue(
            2,
            "A bug",
            vec!["taproot"],
            vec![human_comment(1, "help"), bot_comment(2, "answer")],
        );
        f.platform.insert_item(item.clone());

        let outcome = f.runner.run(&item_summary(&item)).await;
        match outcome {
            WorkflowOutcome::Skip { reason } => {
                assert!(reason.contains("already has a response"), "{reason}")
            }
            other => panic!("expected skip, got {other:?}"),
        }
        assert_eq!(f.platform.comments_on(2).len(), 2);
    }

    #[tokio::test]
    async fn test_new_response_posts_signed_comment() {
        let f = fixture(Arc::new(NoopEditor)).await;
        let item = issue(3, "A bug", vec!["taproot"], vec![]);
        f.platform.insert_item(item.clone());

        let outcome = f.runner.run(&item_summary(&item)).await;
        assert!(matches!(outcome, WorkflowOutcome::Success { .. }));

        let comments = f.platform.comments_on(3);
        assert_eq!(comments.len(), 1);
        assert_eq!(
            comments[0].matches(signature::SIGNATURE_MARKER).count(),
            1,
            "exactly one signature"
        );
        assert!(signature::is_bot_comment(&comments[0]));
    }

    #[tokio::test]
    async fn test_feedback_posts_revised_response() {
        let f = fixture(Arc::new(NoopEditor)).await;
        let item = issue(
            4,
            "A bug",
            vec!["taproot"],
            vec![
                human_comment(1, "help"),
                bot_comment(2, "answer"),
                human_comment(3, "that is wrong"),
            ],
        );
        f.platform.insert_item(item.clone());

        let outcome = f.runner.run(&item_summary(&item)).await;
        assert!(matches!(outcome, WorkflowOutcome::Success { .. }));
        assert_eq!(f.platform.comments_on(4).len(), 4);
    }

    #[tokio::test]
    async fn test_develop_issue_with_ambiguous_branches_reports_all() {
        let f = fixture(Arc::new(NoopEditor)).await;
        let clone_path = f.runner.clone_path.clone();
        let default = f.runner.repo.default_branch.clone();
        git::create_branch(&clone_path, "taproot/issue-42-first", &default)
            .await
            .unwrap();
        git::checkout_clean(&clone_path, &default).await.unwrap();
        git::create_branch(&clone_path, "taproot/issue-42-second", &default)
            .await
            .unwrap();
        git::checkout_clean(&clone_path, &default).await.unwrap();

        let item = issue(
            42,
            "Fix crash",
            vec!["taproot"],
            vec![human_comment(1, "[ develop_issue ]")],
        );
        f.platform.insert_item(item.clone());

        let outcome = f.runner.run(&item_summary(&item)).await;
        match &outcome {
            WorkflowOutcome::Error { detail, .. } => {
                assert!(detail.contains("taproot/issue-42-first"), "{detail}");
                assert!(detail.contains("taproot/issue-42-second"), "{detail}");
            }
            other => panic!("expected error, got {other:?}"),
        }

        // The error reached the issue as one signed comment
        let comments = f.platform.comments_on(42);
        assert_eq!(comments.len(), 2);
        assert_eq!(
            signature::comment_meta(&comments[1]).outcome,
            CommentOutcome::Error
        );

        // Re-running does not duplicate the report: the unresolved error
        // comment turns the second pass into a skip.
        let outcome = f.runner.run(&item_summary(&item)).await;
        assert!(matches!(outcome, WorkflowOutcome::Skip { .. }));
        assert_eq!(f.platform.comments_on(42).len(), 2);
    }

    #[tokio::test]
    async fn test_develop_issue_no_changes_is_error_and_rolls_back() {
        let f = fixture(Arc::new(NoopEditor)).await;
        let item = issue(
            7,
            "Add retries",
            vec!["taproot"],
            vec![human_comment(1, "[ develop_issue ]")],
        );
        f.platform.insert_item(item.clone());

        let outcome = f.runner.run(&item_summary(&item)).await;
        match &outcome {
            WorkflowOutcome::Error { reason, .. } => {
                assert!(reason.contains("no changes"), "{reason}")
            }
            other => panic!("expected error, got {other:?}"),
        }

        // Branch was never pushed, so rollback deleted it
        let clone_path = f.runner.clone_path.clone();
        let leftover = git::list_branches_matching(&clone_path, "taproot/issue-7-")
            .await
            .unwrap();
        assert!(leftover.is_empty());
        assert_eq!(
            git::current_branch(&clone_path).await.unwrap(),
            f.runner.repo.default_branch
        );
    }

    #[tokio::test]
    async fn test_develop_issue_happy_path() {
        let f = fixture(Arc::new(CommittingEditor)).await;
        let item = issue(
            8,
            "Add retries",
            vec!["taproot"],
            vec![human_comment(1, "[ develop_issue ]")],
        );
        f.platform.insert_item(item.clone());

        let outcome = f.runner.run(&item_summary(&item)).await;
        match &outcome {
            WorkflowOutcome::Success { summary } => {
                assert!(summary.contains("pull request"), "{summary}")
            }
            other => panic!("expected success, got {other:?}"),
        }

        // Announcement comment on the issue
        let comments = f.platform.comments_on(8);
        assert!(comments
            .iter()
            .any(|c| c.contains(trigger::PR_CREATED_MARKER)));

        // Marked under development
        assert!(f
            .platform
            .labels_added
            .lock()
            .unwrap()
            .contains(&(8, UNDER_DEVELOPMENT_LABEL.to_string())));

        // PR exists and carries the transcript comment
        let pr_comments = f.platform.comments_on(100);
        assert_eq!(pr_comments.len(), 1);
        assert!(pr_comments[0].contains("<details>"));

        // Clone parked back on the default branch, branch pushed and kept
        let clone_path = f.runner.clone_path.clone();
        assert_eq!(
            git::current_branch(&clone_path).await.unwrap(),
            f.runner.repo.default_branch
        );
        let branches = git::list_branches_matching(&clone_path, "taproot/issue-8-")
            .await
            .unwrap();
        assert_eq!(branches, vec!["taproot/issue-8-add-retries".to_string()]);
    }

    #[tokio::test]
    async fn test_standalone_pr_applies_edits_and_comments() {
        let f = fixture(Arc::new(CommittingEditor)).await;
        let clone_path = f.runner.clone_path.clone();
        let default = f.runner.repo.default_branch.clone();

        // The PR head branch already exists
        git::create_branch(&clone_path, "feature/thing", &default)
            .await
            .unwrap();
        git::checkout_clean(&clone_path, &default).await.unwrap();

        let pr_item = Item {
            number: 20,
            kind: ItemKind::PullRequest,
            title: "Feature thing".to_string(),
            body: "adds the thing".to_string(),
            labels: vec!["taproot".to_string()],
            comments: vec![],
        };
        f.platform.insert_item(pr_item.clone());
        f.platform.prs.lock().unwrap().insert(
            20,
            PullRequest {
                number: 20,
                title: "Feature thing".to_string(),
                body: String::new(),
                head_branch: "feature/thing".to_string(),
                base_branch: default.clone(),
                html_url: format!("https://github.com/{REPO}/pull/20"),
            },
        );

        let outcome = f.runner.run(&item_summary(&pr_item)).await;
        assert!(
            matches!(outcome, WorkflowOutcome::Success { .. }),
            "got {outcome:?}"
        );

        let comments = f.platform.comments_on(20);
        assert_eq!(comments.len(), 1);
        assert!(comments[0].contains("Applied changes"));
        assert_eq!(git::current_branch(&clone_path).await.unwrap(), default);
    }
}
