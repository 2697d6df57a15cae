//! Trigger evaluation: classify an item's current state into exactly one
//! `TriggerKind`.
//!
//! Evaluation is read-only and pure over a pre-assembled snapshot. The
//! priority order lives in the `RULES` table rather than an if/else chain,
//! so the ordering itself can be asserted in tests.

use crate::platform::types::{Comment, ItemKind};
use crate::triage::history::CommentHistory;

pub const GENERATE_EDIT_COMMAND_MARKER: &str = "[ generate_edit_command ]";
pub const DEVELOP_ISSUE_MARKER: &str = "[ develop_issue ]";
pub const TITLE_MARKER: &str = "[ taproot ]";

/// Prefix of the comment the develop-issue workflow leaves on the source
/// issue once its pull request exists.
pub const PR_CREATED_MARKER: &str = "Created pull request:";

pub const UNDER_DEVELOPMENT_LABEL: &str = "under_development";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    GenerateEditCommand,
    UserFeedback,
    PrCommentFollowup,
    DevelopIssue,
    StandalonePr,
    NewResponse,
    None,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::GenerateEditCommand => "generate_edit_command",
            TriggerKind::UserFeedback => "user_feedback",
            TriggerKind::PrCommentFollowup => "pr_comment_followup",
            TriggerKind::DevelopIssue => "develop_issue",
            TriggerKind::StandalonePr => "standalone_pr",
            TriggerKind::NewResponse => "new_response",
            TriggerKind::None => "none",
        }
    }
}

/// Snapshot an item is classified against. Assembled by the caller before
/// evaluation; when the item carries a "Created pull request" comment,
/// `linked_pr` holds that pull request's own comment history.
pub struct TriggerContext<'a> {
    pub kind: ItemKind,
    pub history: &'a CommentHistory,
    pub linked_pr: Option<&'a CommentHistory>,
}

type Predicate = fn(&TriggerContext) -> bool;

/// Priority-ordered trigger rules; the first matching predicate wins.
pub const RULES: &[(Predicate, TriggerKind)] = &[
    (has_generate_edit_command, TriggerKind::GenerateEditCommand),
    (has_user_feedback, TriggerKind::UserFeedback),
    (has_pr_comment_followup, TriggerKind::PrCommentFollowup),
    (has_develop_issue, TriggerKind::DevelopIssue),
    (is_standalone_pr, TriggerKind::StandalonePr),
    (needs_new_response, TriggerKind::NewResponse),
];

/// Classify the item. Returns exactly one kind; `None` means no workflow
/// should run. Evaluating twice against the same snapshot yields the same
/// answer.
pub fn evaluate(ctx: &TriggerContext) -> TriggerKind {
    for (predicate, kind) in RULES {
        if predicate(ctx) {
            return *kind;
        }
    }
    TriggerKind::None
}

/// The bot comment announcing a created pull request, if any.
pub fn pr_creation_comment(history: &CommentHistory) -> Option<&Comment> {
    history
        .comments()
        .iter()
        .rev()
        .find(|c| c.body.contains(PR_CREATED_MARKER))
}

fn has_generate_edit_command(ctx: &TriggerContext) -> bool {
    ctx.history
        .latest_comment()
        .is_some_and(|c| c.body.contains(GENERATE_EDIT_COMMAND_MARKER))
}

fn has_user_feedback(ctx: &TriggerContext) -> bool {
    ctx.history.has_user_feedback()
}

fn has_pr_comment_followup(ctx: &TriggerContext) -> bool {
    ctx.kind == ItemKind::Issue
        && ctx
            .linked_pr
            .is_some_and(|pr_history| pr_history.has_user_feedback())
}

fn has_develop_issue(ctx: &TriggerContext) -> bool {
    ctx.kind == ItemKind::Issue
        && ctx
            .history
            .latest_comment()
            .is_some_and(|c| c.body.contains(DEVELOP_ISSUE_MARKER))
        && pr_creation_comment(ctx.history).is_none()
        && !ctx.history.has_label(UNDER_DEVELOPMENT_LABEL)
}

fn is_standalone_pr(ctx: &TriggerContext) -> bool {
    ctx.kind == ItemKind::PullRequest
}

fn needs_new_response(ctx: &TriggerContext) -> bool {
    ctx.history.index_of_latest_bot_comment().is_none()
}
