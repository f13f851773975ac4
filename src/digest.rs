use std::fmt;

use futures::{StreamExt, TryStreamExt, stream};
use tracing::debug;

use crate::{
    error::DigestError,
    executor::Transport,
    summarize::Summarizer,
    types::{ProjectTarget, Repo, Summary},
};

const MAX_CONCURRENT_TARGETS: usize = 8;

/// One configured unit of the digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    RepoIssues(Repo),
    ProjectIssues(ProjectTarget),
    PullRequests(Repo),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::RepoIssues(repo) => write!(f, "issues of {repo}"),
            Target::ProjectIssues(project) => {
                write!(f, "issues of project {}/{}", project.org, project.number)
            }
            Target::PullRequests(repo) => write!(f, "pull requests of {repo}"),
        }
    }
}

/// Summarizes every target concurrently.
///
/// Summaries come back in the order of `targets`. The first failure fails
/// the whole collection and the other results are dropped.
pub async fn collect_summaries<T: Transport>(
    summarizer: &Summarizer<T>,
    targets: &[Target],
) -> Result<Vec<Summary>, DigestError> {
    stream::iter(targets)
        .map(|target| summarize(summarizer, target))
        .buffered(MAX_CONCURRENT_TARGETS)
        .try_collect()
        .await
}

async fn summarize<T: Transport>(
    summarizer: &Summarizer<T>,
    target: &Target,
) -> Result<Summary, DigestError> {
    debug!(unit = %target, "Summarizing");
    match target {
        Target::RepoIssues(repo) => summarizer.get_repo_issues(&repo.to_string()).await,
        Target::ProjectIssues(project) => {
            summarizer
                .get_project_issues(
                    &project.org,
                    project.number,
                    &project.home_repo.to_string(),
                )
                .await
        }
        Target::PullRequests(repo) => summarizer.get_pull_requests(&repo.to_string()).await,
    }
}
