use std::path::Path;

use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    BranchType, Cred, FetchOptions, PushOptions, RemoteCallbacks, Repository, ResetType,
};

use crate::error::{AppError, Result};

/// Result of a push attempt. A rejected push is a reportable outcome, not an
/// error; only infrastructure failures (panicked task, broken repo) surface
/// as `Err` from [`push`].
#[derive(Debug, Clone)]
pub struct PushOutcome {
    pub ok: bool,
    pub message: String,
}

/// Validate a branch name to prevent argument injection.
/// Rejects names starting with `-` as defence in depth.
fn validate_branch_name(name: &str) -> Result<()> {
    if name.starts_with('-') {
        return Err(AppError::Git(format!(
            "Invalid branch name (starts with '-'): {name}"
        )));
    }
    Ok(())
}

/// Build `FetchOptions` that authenticate via credential callback.
/// The token is captured by the closure and never written to disk.
fn make_fetch_options(token: &str) -> FetchOptions<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, _username_from_url, _allowed_types| {
        Cred::userpass_plaintext("x-access-token", token)
    });
    let mut opts = FetchOptions::new();
    opts.remote_callbacks(callbacks);
    opts
}

/// Clone a repository into the target directory.
///
/// The remote URL stored in `.git/config` is the **plain** URL (no
/// credentials). Authentication happens via credential callback only, so no
/// token ever persists in remote config.
pub async fn clone(url: &str, target: &Path, token: &str) -> Result<()> {
    if !url.starts_with("https://") {
        return Err(AppError::Git(format!(
            "Expected HTTPS clone URL, got: {url}"
        )));
    }

    let url = url.to_string();
    let target = target.to_path_buf();
    let token = token.to_string();

    tokio::task::spawn_blocking(move || {
        let fetch_opts = make_fetch_options(&token);
        RepoBuilder::new()
            .fetch_options(fetch_opts)
            .clone(&url, &target)?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Clone task panicked: {e}")))?
}

/// Fetch all remote heads so the local remote-tracking refs are current.
pub async fn fetch_origin(dir: &Path, token: &str) -> Result<()> {
    let dir = dir.to_path_buf();
    let token = token.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut remote = repo.find_remote("origin")?;
        let mut fetch_opts = make_fetch_options(&token);
        remote.fetch(
            &["refs/heads/*:refs/remotes/origin/*"],
            Some(&mut fetch_opts),
            None,
        )?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Fetch task panicked: {e}")))?
}

/// Checkout a branch, discarding any uncommitted local changes first, and
/// hard-reset it to its remote counterpart when one exists. Workflows never
/// preserve uncommitted state across items; every invocation starts from a
/// known-clean, up-to-date tree regardless of what a previous failed run
/// left behind.
pub async fn checkout_clean(dir: &Path, branch_name: &str) -> Result<()> {
    validate_branch_name(branch_name)?;

    let dir = dir.to_path_buf();
    let branch_name = branch_name.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;

        // Materialize a local branch from the remote-tracking ref when the
        // branch has only ever been fetched (e.g. a PR head branch).
        if repo.find_branch(&branch_name, BranchType::Local).is_err() {
            let remote_ref = repo.find_reference(&format!("refs/remotes/origin/{branch_name}"))?;
            let commit = remote_ref.peel_to_commit()?;
            repo.branch(&branch_name, &commit, false)?;
        }

        let obj = repo.revparse_single(&format!("refs/heads/{branch_name}"))?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force().remove_untracked(true);
        repo.checkout_tree(&obj, Some(&mut checkout))?;
        repo.set_head(&format!("refs/heads/{branch_name}"))?;

        // Align to origin when the branch exists there
        if let Ok(remote_ref) = repo.find_reference(&format!("refs/remotes/origin/{branch_name}")) {
            let commit = remote_ref.peel_to_commit()?;
            repo.reset(commit.as_object(), ResetType::Hard, None)?;
        }

        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Checkout task panicked: {e}")))?
}

/// Create a new branch off the tip of `base_branch` and check it out.
pub async fn create_branch(dir: &Path, branch_name: &str, base_branch: &str) -> Result<()> {
    validate_branch_name(branch_name)?;
    validate_branch_name(base_branch)?;

    let dir = dir.to_path_buf();
    let branch_name = branch_name.to_string();
    let base_branch = base_branch.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let base = repo.revparse_single(&format!("refs/heads/{base_branch}"))?;
        let commit = base.peel_to_commit()?;
        repo.branch(&branch_name, &commit, false)?;
        let obj = repo.revparse_single(&format!("refs/heads/{branch_name}"))?;
        repo.checkout_tree(&obj, None)?;
        repo.set_head(&format!("refs/heads/{branch_name}"))?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Create-branch task panicked: {e}")))?
}

/// Delete a local branch.
pub async fn delete_branch(dir: &Path, branch_name: &str) -> Result<()> {
    validate_branch_name(branch_name)?;

    let dir = dir.to_path_buf();
    let branch_name = branch_name.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut branch = repo.find_branch(&branch_name, BranchType::Local)?;
        branch.delete()?;
        Ok(())
    })
    .await
    .map_err(|e| AppError::Git(format!("Delete-branch task panicked: {e}")))?
}

/// List all branch names (local and remote-tracking, deduplicated) that
/// start with `prefix`. Remote names are reported without the `origin/`
/// qualifier so a branch that exists both locally and on the remote counts
/// once.
pub async fn list_branches_matching(dir: &Path, prefix: &str) -> Result<Vec<String>> {
    let dir = dir.to_path_buf();
    let prefix = prefix.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut names: Vec<String> = Vec::new();

        for entry in repo.branches(None)? {
            let (branch, branch_type) = entry?;
            let Some(name) = branch.name()? else { continue };

            let name = match branch_type {
                BranchType::Local => name.to_string(),
                BranchType::Remote => match name.strip_prefix("origin/") {
                    Some(stripped) if stripped != "HEAD" => stripped.to_string(),
                    _ => continue,
                },
            };

            if name.starts_with(&prefix) && !names.contains(&name) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    })
    .await
    .map_err(|e| AppError::Git(format!("List-branches task panicked: {e}")))?
}

/// Whether a remote-tracking ref exists for the branch.
pub async fn has_remote_ref(dir: &Path, branch_name: &str) -> Result<bool> {
    let dir = dir.to_path_buf();
    let branch_name = branch_name.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let exists = repo
            .find_reference(&format!("refs/remotes/origin/{branch_name}"))
            .is_ok();
        Ok(exists)
    })
    .await
    .map_err(|e| AppError::Git(format!("Remote-ref task panicked: {e}")))?
}

/// Commit hash of HEAD, hex-encoded.
pub async fn head_commit(dir: &Path) -> Result<String> {
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let head = repo.head()?;
        let commit = head.peel_to_commit()?;
        Ok(commit.id().to_string())
    })
    .await
    .map_err(|e| AppError::Git(format!("Head-commit task panicked: {e}")))?
}

/// Name of the currently checked out branch.
pub async fn current_branch(dir: &Path) -> Result<String> {
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let head = repo.head()?;
        head.shorthand()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::Git("HEAD is not on a branch".to_string()))
    })
    .await
    .map_err(|e| AppError::Git(format!("Current-branch task panicked: {e}")))?
}

/// Push a branch to origin. A rejected update (non-fast-forward, hook
/// decline) comes back as `PushOutcome { ok: false, .. }` rather than an
/// error.
pub async fn push(dir: &Path, branch_name: &str, token: &str) -> Result<PushOutcome> {
    validate_branch_name(branch_name)?;

    let dir = dir.to_path_buf();
    let branch_name = branch_name.to_string();
    let token = token.to_string();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut remote = repo.find_remote("origin")?;
        let refspec = format!("refs/heads/{branch_name}:refs/heads/{branch_name}");

        let mut rejection: Option<String> = None;
        {
            let mut callbacks = RemoteCallbacks::new();
            callbacks.credentials(|_url, _username_from_url, _allowed_types| {
                Cred::userpass_plaintext("x-access-token", &token)
            });
            callbacks.push_update_reference(|refname, status| {
                if let Some(msg) = status {
                    rejection = Some(format!("{refname}: {msg}"));
                }
                Ok(())
            });
            let mut push_opts = PushOptions::new();
            push_opts.remote_callbacks(callbacks);

            if let Err(e) = remote.push(&[&refspec], Some(&mut push_opts)) {
                return Ok(PushOutcome {
                    ok: false,
                    message: e.message().to_string(),
                });
            }
        }

        match rejection {
            Some(message) => Ok(PushOutcome { ok: false, message }),
            None => Ok(PushOutcome {
                ok: true,
                message: format!("Pushed {branch_name} to origin"),
            }),
        }
    })
    .await
    .map_err(|e| AppError::Git(format!("Push task panicked: {e}")))?
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use std::fs;
    use std::path::Path;

    /// Initialize a repo with one commit so HEAD and a default branch exist.
    pub fn init_repo_with_commit(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "test").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }
        fs::write(dir.join("README.md"), "hello\n").unwrap();
        commit_all(dir, "initial");
        repo
    }

    /// Stage everything and commit.
    pub fn commit_all(dir: &Path, message: &str) {
        let repo = Repository::open(dir).unwrap();
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("test", "test@example.com").unwrap();
        let parent = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok());
        match parent {
            Some(parent) => {
                repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])
                    .unwrap();
            }
            None => {
                repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[])
                    .unwrap();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::{commit_all, init_repo_with_commit};
    use super::*;
    use std::fs;

    #[test]
    fn test_validate_branch_name_rejects_dash_prefix() {
        assert!(validate_branch_name("-evil").is_err());
        assert!(validate_branch_name("--upload-pack").is_err());
    }

    #[test]
    fn test_validate_branch_name_accepts_normal() {
        assert!(validate_branch_name("main").is_ok());
        assert!(validate_branch_name("taproot/issue-42-fix-crash").is_ok());
    }

    #[tokio::test]
    async fn test_create_and_list_branches() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo_with_commit(tmp.path());
        let default = current_branch(tmp.path()).await.unwrap();

        create_branch(tmp.path(), "taproot/issue-7-fix", &default)
            .await
            .unwrap();
        assert_eq!(current_branch(tmp.path()).await.unwrap(), "taproot/issue-7-fix");

        checkout_clean(tmp.path(), &default).await.unwrap();
        create_branch(tmp.path(), "taproot/issue-7-other", &default)
            .await
            .unwrap();

        let matches = list_branches_matching(tmp.path(), "taproot/issue-7-")
            .await
            .unwrap();
        assert_eq!(
            matches,
            vec![
                "taproot/issue-7-fix".to_string(),
                "taproot/issue-7-other".to_string()
            ]
        );

        let none = list_branches_matching(tmp.path(), "taproot/issue-8-")
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_clean_discards_local_changes() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo_with_commit(tmp.path());
        let default = current_branch(tmp.path()).await.unwrap();

        fs::write(tmp.path().join("README.md"), "dirty edit\n").unwrap();
        checkout_clean(tmp.path(), &default).await.unwrap();

        let content = fs::read_to_string(tmp.path().join("README.md")).unwrap();
        assert_eq!(content, "hello\n");
    }

    #[tokio::test]
    async fn test_head_commit_moves_on_commit() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo_with_commit(tmp.path());

        let before = head_commit(tmp.path()).await.unwrap();
        fs::write(tmp.path().join("new.txt"), "content\n").unwrap();
        commit_all(tmp.path(), "add file");
        let after = head_commit(tmp.path()).await.unwrap();

        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn test_delete_branch() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo_with_commit(tmp.path());
        let default = current_branch(tmp.path()).await.unwrap();

        create_branch(tmp.path(), "taproot/issue-3-tmp", &default)
            .await
            .unwrap();
        checkout_clean(tmp.path(), &default).await.unwrap();
        delete_branch(tmp.path(), "taproot/issue-3-tmp").await.unwrap();

        let matches = list_branches_matching(tmp.path(), "taproot/issue-3-")
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_clone_rejects_non_https() {
        let result = clone(
            "git@github.com:owner/repo.git",
            std::path::Path::new("/tmp/test"),
            "token",
        )
        .await;
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Expected HTTPS clone URL"));
    }
}
