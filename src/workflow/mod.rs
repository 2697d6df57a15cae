pub mod dispatch;
pub mod runner;
pub mod types;

pub use runner::WorkflowRunner;
pub use types::{WorkflowKind, WorkflowOutcome};
