use std::process::Command;

use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use serde_json::{Value, json};

use crate::{
    error::DigestError,
    executor::{Transport, Variables},
};

/// Finds a token in `GITHUB_TOKEN`, then `GH_TOKEN`, then `gh auth token`.
/// Blank variables are skipped.
pub fn get_github_token() -> Result<String> {
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var) {
            if !token.trim().is_empty() {
                return Ok(token);
            }
        }
    }

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("Failed to run 'gh auth token'")?;

    if !output.status.success() {
        anyhow::bail!("Failed to get GitHub token from gh CLI. Please run 'gh auth login' first");
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();

    if token.is_empty() {
        anyhow::bail!("Empty token returned from gh CLI");
    }

    Ok(token)
}

/// Creates an authenticated GitHub client using available credentials.
pub fn setup_github_client() -> Result<Octocrab> {
    let token = get_github_token().context("Failed to obtain GitHub authentication token")?;
    Octocrab::builder()
        .personal_token(token)
        .build()
        .context("Failed to create GitHub client")
}

/// GraphQL transport backed by octocrab.
pub struct GitHub {
    client: Octocrab,
}

impl GitHub {
    pub fn new(client: Octocrab) -> Self {
        Self { client }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(setup_github_client()?))
    }
}

#[async_trait]
impl Transport for GitHub {
    async fn execute(&self, query: &str, variables: &Variables) -> Result<Value, DigestError> {
        let payload = json!({
            "query": query,
            "variables": variables,
        });

        self.client
            .graphql::<Value>(&payload)
            .await
            .map_err(|error| match error {
                // Non-2xx answers (bad credentials, rate limits) carry the
                // API's message.
                octocrab::Error::GitHub { source, .. } => {
                    DigestError::Transport(source.message.clone())
                }
                other => DigestError::Http(other.to_string()),
            })
    }
}
