//! Execution plans produced by the query planner.

pub mod entities;

pub use entities::{ExecutionPlan, PlanStep, StepId, StepTarget, Strategy};
