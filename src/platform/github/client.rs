use async_trait::async_trait;
use octocrab::Octocrab;

use crate::config::GitHubConfig;
use crate::error::{AppError, Result};
use crate::platform::types::*;
use crate::platform::Platform;

use super::mapper;

pub struct GitHubPlatform {
    client: Octocrab,
}

impl GitHubPlatform {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(config.token.clone())
            .build()
            .map_err(|e| AppError::GitHubApi(format!("Failed to build octocrab client: {e}")))?;

        Ok(Self { client })
    }

    fn parse_repo(repo_full_name: &str) -> Result<(&str, &str)> {
        let parts: Vec<&str> = repo_full_name.splitn(2, '/').collect();
        if parts.len() != 2 {
            return Err(AppError::GitHubApi(format!(
                "Invalid repo name: {repo_full_name}"
            )));
        }
        Ok((parts[0], parts[1]))
    }
}

#[async_trait]
impl Platform for GitHubPlatform {
    async fn repo_info(&self, repo_full_name: &str) -> Result<RepoInfo> {
        let (owner, repo) = Self::parse_repo(repo_full_name)?;

        let repository = self.client.repos(owner, repo).get().await?;

        Ok(RepoInfo {
            full_name: repository
                .full_name
                .unwrap_or_else(|| repo_full_name.to_string()),
            clone_url: repository
                .clone_url
                .map(|u| u.to_string())
                .ok_or_else(|| AppError::GitHubApi("Repository has no clone URL".to_string()))?,
            default_branch: repository
                .default_branch
                .unwrap_or_else(|| "main".to_string()),
        })
    }

    async fn list_open_items(&self, repo_full_name: &str) -> Result<Vec<ItemSummary>> {
        let (owner, repo) = Self::parse_repo(repo_full_name)?;

        let page = self
            .client
            .issues(owner, repo)
            .list()
            .state(octocrab::params::State::Open)
            .per_page(100)
            .send()
            .await?;

        let items = self.client.all_pages(page).await?;

        Ok(items.iter().map(mapper::map_item_summary).collect())
    }

    async fn get_item(&self, repo_full_name: &str, number: u64) -> Result<Item> {
        let (owner, repo) = Self::parse_repo(repo_full_name)?;

        let issue = self.client.issues(owner, repo).get(number).await?;

        let comments_page = self
            .client
            .issues(owner, repo)
            .list_comments(number)
            .per_page(100)
            .send()
            .await?;
        let comments = self.client.all_pages(comments_page).await?;

        Ok(mapper::map_item(&issue, comments))
    }

    async fn post_comment(&self, repo_full_name: &str, number: u64, body: &str) -> Result<()> {
        let (owner, repo) = Self::parse_repo(repo_full_name)?;

        self.client
            .issues(owner, repo)
            .create_comment(number, body)
            .await?;

        Ok(())
    }

    async fn add_label(&self, repo_full_name: &str, number: u64, label: &str) -> Result<()> {
        let (owner, repo) = Self::parse_repo(repo_full_name)?;

        self.client
            .issues(owner, repo)
            .add_labels(number, &[label.to_string()])
            .await?;

        Ok(())
    }

    async fn get_pull_request(&self, repo_full_name: &str, pr_number: u64) -> Result<PullRequest> {
        let (owner, repo) = Self::parse_repo(repo_full_name)?;

        let pr = self.client.pulls(owner, repo).get(pr_number).await?;

        Ok(mapper::map_pull_request(pr))
    }

    async fn create_pull_request(
        &self,
        repo_full_name: &str,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest> {
        let (owner, repo) = Self::parse_repo(repo_full_name)?;

        let created = self
            .client
            .pulls(owner, repo)
            .create(&pr.title, &pr.head_branch, &pr.base_branch)
            .body(&pr.body)
            .send()
            .await?;

        Ok(mapper::map_pull_request(created))
    }
}
