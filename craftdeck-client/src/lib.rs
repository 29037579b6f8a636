//! Spacelift access layer for craftdeck
//!
//! This crate owns everything that talks to the Spacelift GraphQL API: the
//! cached bearer credential, the raw query/mutation transport, the typed stack
//! operations behind the [`StackApi`] trait, and the mapping from Spacelift's
//! stack representation into [`InfraUnit`].
//!
//! Stack names are classified exactly once, when a stack is mapped, so that
//! callers work with a [`UnitRole`] and a group key instead of re-matching
//! names themselves.

pub mod auth;
pub mod classify;
pub mod error;
pub mod graphql;
pub mod spacelift;
pub mod unit;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

pub use auth::{TokenCache, DEFAULT_TOKEN_VALIDITY};
pub use classify::{classify, normalize, Origin, UnitClass, UnitRole};
pub use error::{ClientError, Result};
pub use graphql::{ApiKey, GraphqlClient};
pub use spacelift::{BlueprintSummary, RunSummary, SpaceliftClient, StackApi, TemplateInput, Viewer};
pub use unit::{InfraUnit, UnitState};
