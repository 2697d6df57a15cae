//! Trigger-to-workflow dispatch.

use crate::triage::TriggerKind;
use crate::workflow::types::WorkflowKind;

/// Map a trigger to its workflow. Pure and total over the closed
/// `TriggerKind` enumeration: a missing arm is a compile error, not a
/// runtime `None`. Only `TriggerKind::None` maps to no workflow, which the
/// caller treats as "skip, no active trigger".
pub fn dispatch(trigger: TriggerKind) -> Option<WorkflowKind> {
    match trigger {
        TriggerKind::GenerateEditCommand => Some(WorkflowKind::GenerateEditCommand),
        TriggerKind::UserFeedback => Some(WorkflowKind::FeedbackResponse),
        TriggerKind::PrCommentFollowup => Some(WorkflowKind::PrCommentFollowup),
        TriggerKind::DevelopIssue => Some(WorkflowKind::DevelopIssue),
        TriggerKind::StandalonePr => Some(WorkflowKind::StandalonePr),
        TriggerKind::NewResponse => Some(WorkflowKind::NewResponse),
        TriggerKind::None => None,
    }
}
