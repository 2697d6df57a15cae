//! Branch lifecycle management for code-editing workflows.
//!
//! One manager instance covers one workflow invocation over one local
//! clone. The clone is owned exclusively for that duration; sequential
//! item processing is what makes that safe. All paths are explicit;
//! nothing here touches the process working directory.

use std::path::{Path, PathBuf};

use crate::editor::{CodeEditor, EditorTranscript};
use crate::error::{AppError, Result};
use crate::platform::types::{CreatePullRequest, PullRequest};
use crate::platform::Platform;
use crate::workspace::git;

pub use crate::workspace::git::PushOutcome;

const BRANCH_NAMESPACE: &str = "taproot/issue-";

/// Working-copy state for one workflow invocation. Terminal states are
/// `Published` (success) and `RolledBack` (failure); every non-terminal
/// state has an error edge to `RolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Resolved,
    CheckedOut,
    Mutated,
    Pushed,
    Published,
    RolledBack,
}

/// A branch resolved or created for an item.
#[derive(Debug, Clone)]
pub struct DevelopmentBranch {
    pub name: String,
    pub newly_created: bool,
}

pub struct BranchLifecycleManager {
    repo_path: PathBuf,
    default_branch: String,
    state: LifecycleState,
    pushed: bool,
}

impl BranchLifecycleManager {
    pub fn new(repo_path: impl Into<PathBuf>, default_branch: impl Into<String>) -> Self {
        Self {
            repo_path: repo_path.into(),
            default_branch: default_branch.into(),
            state: LifecycleState::Idle,
            pushed: false,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Prefix shared by every branch referencing this issue number. The
    /// trailing dash keeps issue 4 from matching issue 42's branches.
    pub fn branch_prefix(issue_number: u64) -> String {
        format!("{BRANCH_NAMESPACE}{issue_number}-")
    }

    pub fn branch_name_for(issue_number: u64, title: &str) -> String {
        format!("{}{}", Self::branch_prefix(issue_number), slugify(title))
    }

    /// Resolve the branch tied to an issue, optionally creating it.
    ///
    /// Zero matches without `allow_create` returns `None` (caller may
    /// skip). More than one match is a structural invariant violation:
    /// the full ambiguous set is returned in the error and no branch is
    /// ever picked silently.
    pub async fn resolve_or_create(
        &mut self,
        issue_number: u64,
        title: &str,
        allow_create: bool,
    ) -> Result<Option<DevelopmentBranch>> {
        let prefix = Self::branch_prefix(issue_number);
        let matches = git::list_branches_matching(&self.repo_path, &prefix).await?;

        match matches.len() {
            0 if !allow_create => {
                self.state = LifecycleState::Resolved;
                Ok(None)
            }
            0 => {
                let name = Self::branch_name_for(issue_number, title);
                git::create_branch(&self.repo_path, &name, &self.default_branch).await?;
                tracing::info!(branch = %name, issue = issue_number, "Created development branch");
                self.state = LifecycleState::Resolved;
                Ok(Some(DevelopmentBranch {
                    name,
                    newly_created: true,
                }))
            }
            1 => {
                self.state = LifecycleState::Resolved;
                Ok(Some(DevelopmentBranch {
                    name: matches.into_iter().next().expect("one match"),
                    newly_created: false,
                }))
            }
            _ => Err(AppError::MultipleBranches {
                issue_number,
                branches: matches,
            }),
        }
    }

    /// Checkout a branch, discarding uncommitted changes and aligning to
    /// its remote counterpart when one exists.
    pub async fn checkout(&mut self, branch: &str) -> Result<()> {
        git::checkout_clean(&self.repo_path, branch).await?;
        self.state = LifecycleState::CheckedOut;
        Ok(())
    }

    /// Run the external editor against the checked-out branch.
    ///
    /// HEAD is recorded before and after: a successful exit that leaves
    /// HEAD unmoved is `NoChanges`, a failure in its own right. Exit
    /// status alone never implies a mutation happened.
    pub async fn run_external_edit(
        &mut self,
        editor: &dyn CodeEditor,
        instruction: &str,
    ) -> Result<EditorTranscript> {
        let before = git::head_commit(&self.repo_path).await?;
        let transcript = editor.run(instruction, &self.repo_path).await?;
        let after = git::head_commit(&self.repo_path).await?;

        if before == after {
            return Err(AppError::NoChanges);
        }

        self.state = LifecycleState::Mutated;
        Ok(transcript)
    }

    /// Push the branch to origin. Rejection comes back as an outcome, not
    /// an error; the token is supplied through credential callbacks and is
    /// never written into remote config.
    pub async fn push(&mut self, branch: &str, token: &str) -> Result<PushOutcome> {
        let outcome = git::push(&self.repo_path, branch, token).await?;
        if outcome.ok {
            self.pushed = true;
            self.state = LifecycleState::Pushed;
        }
        Ok(outcome)
    }

    /// Create the pull request tied to the pushed branch.
    pub async fn publish_pr(
        &mut self,
        platform: &dyn Platform,
        repo_full_name: &str,
        request: &CreatePullRequest,
    ) -> Result<PullRequest> {
        let pr = platform.create_pull_request(repo_full_name, request).await?;
        self.state = LifecycleState::Published;
        tracing::info!(pr = pr.number, branch = %request.head_branch, "Opened pull request");
        Ok(pr)
    }

    /// Comment on a PR, suppressing the post when the identical text is
    /// already the latest comment (retried failures must not spam).
    pub async fn comment_on_pr(
        &self,
        platform: &dyn Platform,
        repo_full_name: &str,
        pr_number: u64,
        body: &str,
    ) -> Result<bool> {
        let pr_item = platform.get_item(repo_full_name, pr_number).await?;
        if pr_item.comments.last().map(|c| c.body.as_str()) == Some(body) {
            tracing::info!(pr = pr_number, "Identical comment already present, skipping");
            return Ok(false);
        }
        platform.post_comment(repo_full_name, pr_number, body).await?;
        Ok(true)
    }

    /// Return the working copy to the default branch and delete the working
    /// branch if it was never successfully pushed. A branch that reached
    /// the remote, in this invocation or an earlier one, is left alive.
    pub async fn rollback(&mut self, branch: &str, delete_if_unpushed: bool) -> Result<()> {
        git::checkout_clean(&self.repo_path, &self.default_branch).await?;

        if delete_if_unpushed && !self.pushed && !self.exists_on_remote(branch).await {
            match git::delete_branch(&self.repo_path, branch).await {
                Ok(()) => tracing::info!(branch = %branch, "Deleted unpushed branch"),
                // Nothing to delete if the failure predates branch creation
                Err(e) => tracing::debug!(branch = %branch, error = %e, "Branch not deleted"),
            }
        }

        self.state = LifecycleState::RolledBack;
        Ok(())
    }

    async fn exists_on_remote(&self, branch: &str) -> bool {
        git::has_remote_ref(&self.repo_path, branch).await.unwrap_or(false)
    }

    /// Success-path epilogue: leave the clone parked on the default branch.
    pub async fn restore_default_branch(&self) -> Result<()> {
        git::checkout_clean(&self.repo_path, &self.default_branch).await
    }

    pub fn was_pushed(&self) -> bool {
        self.pushed
    }
}

fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut last_was_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && !slug.is_empty() {
            slug.push('-');
            last_was_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "dev".to_string()
    } else {
        slug.to_string()
    }
}
