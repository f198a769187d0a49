//! GitHub connector - pull request lookup and merging via the REST API

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::{Connector, ConnectorError, Proposal};
use crate::config::HostingConfig;

#[derive(Debug, Deserialize)]
struct PullRequest {
    number: u64,
    title: String,
    html_url: String,
    base: PullRequestRef,
}

#[derive(Debug, Deserialize)]
struct PullRequestRef {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct MergeResponse {
    sha: String,
}

/// [`Connector`] for pull requests on GitHub's REST API
#[derive(Debug)]
pub struct GitHubConnector {
    api_url: String,
    owner: String,
    repo: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl GitHubConnector {
    pub fn new(
        api_url: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, ConnectorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("gitstep/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            api_url: api_url.into(),
            owner: owner.into(),
            repo: repo.into(),
            token,
            client,
        })
    }

    /// Build a connector from configuration, reading the token from the configured env var
    pub fn from_config(config: &HostingConfig) -> Result<Self, ConnectorError> {
        let token = std::env::var(&config.token_env).ok();
        if token.is_none() {
            debug!(
                "No API token in {}, using unauthenticated requests",
                config.token_env
            );
        }
        Self::new(&config.api_url, &config.owner, &config.repo, token)
    }

    fn build_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.api_url.trim_end_matches('/'),
            self.owner,
            self.repo,
            path
        )
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Accept", "application/vnd.github+json");
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ConnectorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ConnectorError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Connector for GitHubConnector {
    fn name(&self) -> &str {
        "GitHub"
    }

    async fn find_proposal(
        &self,
        branch: &str,
        target: &str,
    ) -> Result<Option<Proposal>, ConnectorError> {
        let head = format!("{}:{}", self.owner, branch);
        let request = self
            .client
            .get(self.build_url("/pulls"))
            .query(&[("head", head.as_str()), ("base", target), ("state", "open")]);
        let response = Self::check(self.apply_auth(request).send().await?).await?;
        let pulls: Vec<PullRequest> = response.json().await?;

        if pulls.len() > 1 {
            return Err(ConnectorError::Api {
                status: 409,
                message: format!(
                    "found {} pull requests for branch {} into {}",
                    pulls.len(),
                    branch,
                    target
                ),
            });
        }

        Ok(pulls.into_iter().next().map(|pr| Proposal {
            number: pr.number,
            title: pr.title,
            target: pr.base.name,
            url: pr.html_url,
        }))
    }

    async fn squash_merge_proposal(
        &self,
        number: u64,
        commit_message: &str,
    ) -> Result<String, ConnectorError> {
        let (title, body) = match commit_message.split_once('\n') {
            Some((title, body)) => (title.trim(), body.trim()),
            None => (commit_message.trim(), ""),
        };
        info!("Merging pull request #{} via {}", number, self.name());
        let request = self
            .client
            .put(self.build_url(&format!("/pulls/{}/merge", number)))
            .json(&json!({
                "merge_method": "squash",
                "commit_title": title,
                "commit_message": body,
            }));
        let response = Self::check(self.apply_auth(request).send().await?).await?;
        let merged: MergeResponse = response.json().await?;
        Ok(merged.sha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        let connector =
            GitHubConnector::new("https://api.github.com/", "octo", "hello", None).unwrap();
        assert_eq!(
            connector.build_url("/pulls"),
            "https://api.github.com/repos/octo/hello/pulls"
        );
    }

    #[test]
    fn test_pull_request_payload() {
        let payload = r#"[{"number": 7, "title": "Add feature", "html_url": "https://github.com/octo/hello/pull/7", "base": {"ref": "main"}}]"#;
        let pulls: Vec<PullRequest> = serde_json::from_str(payload).unwrap();
        assert_eq!(pulls[0].number, 7);
        assert_eq!(pulls[0].base.name, "main");
    }
}
