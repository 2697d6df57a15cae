pub mod github;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::*;

#[async_trait]
pub trait Platform: Send + Sync {
    /// Fetch repository coordinates (clone URL, default branch).
    async fn repo_info(&self, repo_full_name: &str) -> Result<RepoInfo>;

    /// List all open issues and pull requests.
    async fn list_open_items(&self, repo_full_name: &str) -> Result<Vec<ItemSummary>>;

    /// Fetch a full item with comments and labels. Called fresh each pass;
    /// implementations must not cache across passes.
    async fn get_item(&self, repo_full_name: &str, number: u64) -> Result<Item>;

    /// Post a comment on an issue or PR.
    async fn post_comment(&self, repo_full_name: &str, number: u64, body: &str) -> Result<()>;

    /// Add a label to an issue or PR.
    async fn add_label(&self, repo_full_name: &str, number: u64, label: &str) -> Result<()>;

    /// Fetch a pull request.
    async fn get_pull_request(&self, repo_full_name: &str, pr_number: u64) -> Result<PullRequest>;

    /// Create a pull request.
    async fn create_pull_request(
        &self,
        repo_full_name: &str,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest>;
}
