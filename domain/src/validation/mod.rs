//! Step results and response validation.

pub mod step_result;
pub mod validator;

pub use step_result::{StepPayload, StepResult};
pub use validator::{
    Clarification, Decision, ResponseValidator, ScoreBreakdown, ValidationPolicy, ValidationResult,
};
