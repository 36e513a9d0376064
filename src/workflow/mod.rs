pub mod reconciliation;
pub mod session_store;
pub mod submission_flow;

pub use reconciliation::{FinalAnswerSet, QuestionState, QuestionStatus, Reconciliation, ResolveAction};
pub use session_store::{MemorySessionStorage, SessionStorage, FINAL_ANSWERS_KEY, VALIDATION_RESULT_KEY};
pub use submission_flow::{IntakeForm, Notice, Stage, SubmissionFlow};
