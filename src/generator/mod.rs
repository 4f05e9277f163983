pub mod context;
pub mod error;
pub mod evaluator;
pub mod improver;
pub mod progress;
pub mod tasks;
pub mod types;
pub mod workflow;
pub mod writers;

pub use context::JobContext;
pub use error::WorkflowError;
pub use types::{Report, ReportTask, ResearchData};
pub use workflow::WorkflowController;
