//! GitHub integration: workflow run logs, pull request resolution, and
//! the pull request comment thread.

pub mod archive;
mod client;

pub use client::GitHubClient;
