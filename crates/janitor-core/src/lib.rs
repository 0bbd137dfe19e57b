//! Core types, configuration, and error handling for CI Janitor.
//!
//! This crate provides the shared foundation used by all other janitor crates:
//! - [`JanitorError`]: unified error type using `thiserror` and `miette`
//! - [`JanitorConfig`]: configuration loaded from `.ci-janitor.toml`
//! - [`RunContext`]: the per-invocation inputs (repository, run, PR, branch)
//! - Shared types: [`Finding`], [`FailureKind`], [`ApprovalState`], [`ApprovalSignal`]
//! - [`with_retry`]: timeout plus single retry around network calls

mod config;
mod error;
mod retry;
mod types;

pub use config::{
    split_repo, ApprovalConfig, ClassifyConfig, FlagScope, GitConfig, GitHubConfig,
    JanitorConfig, ManifestConfig, NetworkConfig, RunContext,
};
pub use error::JanitorError;
pub use retry::with_retry;
pub use types::{
    ApprovalSignal, ApprovalState, Evidence, FailureKind, Finding, OutputFormat, Parameters,
};

/// A convenience `Result` type for janitor operations.
pub type Result<T> = std::result::Result<T, JanitorError>;
