use serde::{Deserialize, Serialize};

/// Repository coordinates needed to clone and open PRs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoInfo {
    pub full_name: String,
    pub clone_url: String,
    pub default_branch: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Issue,
    PullRequest,
}

impl ItemKind {
    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::Issue => "issue",
            ItemKind::PullRequest => "PR",
        }
    }
}

/// Summary of an open issue or pull request, as returned by a listing call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSummary {
    pub number: u64,
    pub kind: ItemKind,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// A fully fetched issue or pull request with its comment thread.
/// Fetched fresh every processing pass; never cached across passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub number: u64,
    pub kind: ItemKind,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub comments: Vec<Comment>,
}

/// Comments arrive in creation order; insertion order is chronological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub author: String,
    pub body: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub head_branch: String,
    pub base_branch: String,
    pub html_url: String,
}

#[derive(Debug, Clone)]
pub struct CreatePullRequest {
    pub title: String,
    pub body: String,
    pub head_branch: String,
    pub base_branch: String,
}
