/// Terminal result of one workflow execution.
///
/// Every workflow reduces to this three-way outcome regardless of how many
/// internal steps it took, so the repository processor never needs
/// workflow-specific handling. Never dropped silently: success and error
/// surface as posted comments, skip as a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Success { summary: String },
    Skip { reason: String },
    Error { reason: String, detail: String },
}

impl WorkflowOutcome {
    pub fn skip(reason: impl Into<String>) -> Self {
        WorkflowOutcome::Skip {
            reason: reason.into(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WorkflowOutcome::Success { .. } => "success",
            WorkflowOutcome::Skip { .. } => "skip",
            WorkflowOutcome::Error { .. } => "error",
        }
    }
}

/// Handle to one of the mutually exclusive workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    NewResponse,
    FeedbackResponse,
    GenerateEditCommand,
    DevelopIssue,
    PrCommentFollowup,
    StandalonePr,
}
