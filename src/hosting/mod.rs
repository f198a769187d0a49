//! Remote hosting connectors
//!
//! A [`Connector`] gives steps access to pull requests ("proposals") on the
//! code hosting platform. It is optional: without a configured connector,
//! workflows plan local-only steps.

pub mod github;

pub use github::GitHubConnector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors talking to the hosting platform
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// An open pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub number: u64,
    pub title: String,
    pub target: String,
    pub url: String,
}

/// Pull-request operations on the hosting platform
#[async_trait]
pub trait Connector: Send + Sync {
    /// Human readable platform name, e.g. "GitHub"
    fn name(&self) -> &str;

    /// Find the open proposal merging `branch` into `target`
    async fn find_proposal(
        &self,
        branch: &str,
        target: &str,
    ) -> Result<Option<Proposal>, ConnectorError>;

    /// Squash-merge the proposal and return the SHA of the merge commit
    async fn squash_merge_proposal(
        &self,
        number: u64,
        commit_message: &str,
    ) -> Result<String, ConnectorError>;
}
