//! Environment orchestration business logic
//!
//! Turns the flat stack list Spacelift returns into environment groups, drives
//! ordered multi-stack teardowns, and exposes the request-level operations the
//! HTTP layer calls. It is consumed by craftdeck-api but has no HTTP knowledge
//! of its own.

pub mod error;
pub mod grouping;
pub mod resolve;
pub mod service;
pub mod teardown;

pub use error::{Result, ServiceError, SERVER_NOT_FOUND};
pub use grouping::{
    aggregate_status, group_units, AggregateStatus, EnvironmentGroup, MemberSummary, PassThrough,
};
pub use service::{
    Connectivity, DeployOutcome, DeployRequest, EnvironmentService, RunLogs, SaveOutcome,
    ServerDetail, ServiceSettings,
};
pub use teardown::{
    LogLevel, StatusEntry, StepAction, StepResult, StepStatus, Teardown, TeardownMode,
    TeardownOptions, TeardownPlan, TeardownReport, TeardownSettings,
};
