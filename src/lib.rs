//! gh-digest: a digest of recent GitHub issue and pull request activity.
//!
//! Queries the GitHub GraphQL API for issues of repositories, issues on
//! organization projects and pull requests, follows every connection to its
//! end, trims everything to a cutoff time and renders the result as an HTML
//! page plus a JSON snapshot.

pub mod cli;
pub mod digest;
pub mod error;
pub mod executor;
pub mod github;
pub mod graphql;
pub mod paginate;
pub mod report;
pub mod summarize;
pub mod types;

pub use cli::{DigestRequest, parse_args};
pub use digest::{Target, collect_summaries};
pub use error::{DigestError, Location};
pub use executor::{Discard, JsonDumpDir, QueryExecutor, ResponseSink, Transport, Variables};
pub use github::GitHub;
pub use paginate::ResultPath;
pub use summarize::{Summarizer, merge_pull_request_activity};
pub use types::{
    Activity, ActivityKind, ActivityLog, Actor, Comment, Connection, Container, ContainerKind,
    Item, ProjectTarget, Repo, Review, ReviewState, Since, Summary, Timestamped,
};
