use crate::platform::types;

/// Map an octocrab Issue listing entry to an ItemSummary.
/// GitHub returns PRs through the issues API; the `pull_request` link is
/// what distinguishes the two kinds.
pub fn map_item_summary(issue: &octocrab::models::issues::Issue) -> types::ItemSummary {
    types::ItemSummary {
        number: issue.number,
        kind: map_kind(issue),
        title: issue.title.clone(),
        body: issue.body.clone().unwrap_or_default(),
        labels: issue.labels.iter().map(|l| l.name.clone()).collect(),
    }
}

/// Map an octocrab Issue plus its comment thread to a full Item.
pub fn map_item(
    issue: &octocrab::models::issues::Issue,
    comments: Vec<octocrab::models::issues::Comment>,
) -> types::Item {
    types::Item {
        number: issue.number,
        kind: map_kind(issue),
        title: issue.title.clone(),
        body: issue.body.clone().unwrap_or_default(),
        labels: issue.labels.iter().map(|l| l.name.clone()).collect(),
        comments: comments.into_iter().map(map_comment).collect(),
    }
}

fn map_kind(issue: &octocrab::models::issues::Issue) -> types::ItemKind {
    if issue.pull_request.is_some() {
        types::ItemKind::PullRequest
    } else {
        types::ItemKind::Issue
    }
}

fn map_comment(comment: octocrab::models::issues::Comment) -> types::Comment {
    types::Comment {
        id: comment.id.into_inner(),
        author: comment.user.login,
        body: comment.body.unwrap_or_default(),
        created_at: Some(comment.created_at),
    }
}

pub fn map_pull_request(pr: octocrab::models::pulls::PullRequest) -> types::PullRequest {
    types::PullRequest {
        number: pr.number,
        title: pr.title.clone().unwrap_or_default(),
        body: pr.body.clone().unwrap_or_default(),
        head_branch: pr.head.ref_field.clone(),
        base_branch: pr.base.ref_field.clone(),
        html_url: pr
            .html_url
            .as_ref()
            .map(|u| u.to_string())
            .unwrap_or_default(),
    }
}
