//! Approval-gated remediation of classified CI failures.
//!
//! Provides the approval gate, the requirements manifest editor, the git
//! workspace, comment rendering, and the engine that ties them together
//! behind the collaborator traits in [`collab`].

pub mod collab;
pub mod engine;
pub mod gate;
pub mod manifest;
pub mod messages;
pub mod request;
pub mod vcs;

pub use engine::{RemediationEngine, RemediationOutcome};
