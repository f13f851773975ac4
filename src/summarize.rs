//! Per-container aggregation of recent issue and pull request activity.
//!
//! Each `get_*` operation fetches one container (a repository's issues, a
//! project's issues, or a repository's pull requests), backfills comments
//! the inline query could not carry, keeps only what changed after the
//! cutoff, and records why each item is in the digest.

use futures::{StreamExt, TryStreamExt, stream};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{
    error::DigestError,
    executor::{QueryExecutor, Transport, Variables},
    graphql::{
        ISSUE_COMMENTS_PATH, ISSUE_COMMENTS_QUERY, PROJECT_ISSUES_QUERY, PROJECT_ITEMS_PATH,
        PROJECT_PATH, PULL_REQUEST_COMMENTS_PATH, PULL_REQUEST_COMMENTS_QUERY, PULL_REQUESTS_PATH,
        PULL_REQUESTS_QUERY, REPO_ISSUES_PATH, REPO_ISSUES_QUERY, REPOSITORY_PATH,
    },
    paginate::ResultPath,
    types::{
        Activity, ActivityKind, ActivityLog, Comment, Container, Item, Project, Repo, Repository,
        ReviewState, Since, Summary, Timestamped,
    },
};

const MAX_CONCURRENT_BACKFILLS: usize = 4;

/// Which comments query backfills an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommentSource {
    Issue,
    PullRequest,
}

impl CommentSource {
    fn query(self) -> &'static str {
        match self {
            CommentSource::Issue => &ISSUE_COMMENTS_QUERY,
            CommentSource::PullRequest => &PULL_REQUEST_COMMENTS_QUERY,
        }
    }

    fn path(self) -> ResultPath {
        match self {
            CommentSource::Issue => ISSUE_COMMENTS_PATH,
            CommentSource::PullRequest => PULL_REQUEST_COMMENTS_PATH,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProjectItem {
    content: Option<ProjectContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum ProjectContent {
    Issue(Box<Item>),
    #[serde(other)]
    Other,
}

fn variables(value: Value) -> Variables {
    match value {
        Value::Object(map) => map,
        _ => Variables::new(),
    }
}

/// Fetches and condenses activity since a fixed cutoff.
pub struct Summarizer<T> {
    since: Since,
    gql: QueryExecutor<T>,
}

impl<T: Transport> Summarizer<T> {
    pub fn new(since: Since, gql: QueryExecutor<T>) -> Self {
        Self { since, gql }
    }

    pub fn executor(&self) -> &QueryExecutor<T> {
        &self.gql
    }

    /// Issues of `repo` (`owner/name`) updated after the cutoff, with the
    /// comments made after it.
    pub async fn get_repo_issues(&self, repo: &str) -> Result<Summary, DigestError> {
        let repo = Repo::parse(repo)?;
        let (response, issues) = self
            .gql
            .fetch_all::<Item>(
                &REPO_ISSUES_QUERY,
                REPO_ISSUES_PATH,
                variables(json!({
                    "owner": repo.owner(),
                    "name": repo.name(),
                    "since": self.since.to_graphql(),
                })),
            )
            .await?;

        let mut issues = self.trim_since(issues);
        self.populate_comments(&mut issues, CommentSource::Issue)
            .await?;
        self.add_reasons(&mut issues);
        for issue in &mut issues {
            issue.comments_to_show = plain_comments(issue);
        }

        let repository: Repository = REPOSITORY_PATH.decode(&response)?;
        let container = Container::from_repository(repository, ActivityKind::Issues);
        info!(repo = %repo, issues = issues.len(), "Summarized repository issues");
        Ok(Summary {
            container,
            items: issues,
        })
    }

    /// Issues on project `number` of `org` updated after the cutoff.
    ///
    /// Project cards that are not issues are skipped. Issues living outside
    /// `home_repo` are flagged with `other_repo`.
    pub async fn get_project_issues(
        &self,
        org: &str,
        number: u64,
        home_repo: &str,
    ) -> Result<Summary, DigestError> {
        let (response, project_items) = self
            .gql
            .fetch_all::<ProjectItem>(
                &PROJECT_ISSUES_QUERY,
                PROJECT_ITEMS_PATH,
                variables(json!({
                    "org": org,
                    "projectNumber": number,
                })),
            )
            .await?;

        let issues = project_items
            .into_iter()
            .filter_map(|item| match item.content {
                Some(ProjectContent::Issue(issue)) => Some(*issue),
                Some(ProjectContent::Other) | None => None,
            })
            .collect::<Vec<_>>();
        let mut issues = self.trim_since(issues);
        self.populate_comments(&mut issues, CommentSource::Issue)
            .await?;
        self.add_reasons(&mut issues);
        for issue in &mut issues {
            issue.other_repo = Some(issue.repository.name_with_owner != home_repo);
            issue.comments_to_show = plain_comments(issue);
        }

        let project: Project = PROJECT_PATH.decode(&response)?;
        let container = Container::from_project(project, ActivityKind::Issues);
        info!(org, number, issues = issues.len(), "Summarized project issues");
        Ok(Summary {
            container,
            items: issues,
        })
    }

    /// Pull requests of `repo` updated after the cutoff, with their
    /// comments, review comments and completed reviews merged into one list.
    ///
    /// Pull requests arrive newest-updated first, so paging stops once a
    /// page ends before the cutoff.
    pub async fn get_pull_requests(&self, repo: &str) -> Result<Summary, DigestError> {
        let repo = Repo::parse(repo)?;
        let cutoff = self.since.as_datetime();
        let (response, pulls) = self
            .gql
            .fetch_all_until::<Item, _>(
                &PULL_REQUESTS_QUERY,
                PULL_REQUESTS_PATH,
                variables(json!({
                    "owner": repo.owner(),
                    "name": repo.name(),
                })),
                |page: &[Item]| page.last().is_some_and(|oldest| oldest.updated_at < cutoff),
            )
            .await?;

        let mut pulls = self.trim_since(pulls);
        self.populate_comments(&mut pulls, CommentSource::PullRequest)
            .await?;
        for pull in &mut pulls {
            pull.comments_to_show = self.trim_since(merge_pull_request_activity(pull));
        }
        self.add_reasons(&mut pulls);

        let repository: Repository = REPOSITORY_PATH.decode(&response)?;
        let container = Container::from_repository(repository, ActivityKind::PullRequests);
        info!(repo = %repo, pull_requests = pulls.len(), "Summarized pull requests");
        Ok(Summary {
            container,
            items: pulls,
        })
    }

    /// Keeps nodes updated strictly after the cutoff, oldest first.
    pub fn trim_since<N, I>(&self, nodes: I) -> Vec<N>
    where
        N: Timestamped,
        I: IntoIterator<Item = N>,
    {
        let mut kept: Vec<N> = nodes
            .into_iter()
            .filter(|node| self.since.includes(node.updated_at()))
            .collect();
        kept.sort_by_key(|node| node.updated_at());
        kept
    }

    /// Records why each item made it into the digest.
    pub fn add_reasons(&self, items: &mut [Item]) {
        for item in items {
            item.reason_created = self.since.includes(item.created_at);
            item.reason_closed = item.closed_at.is_some_and(|at| self.since.includes(at));
            item.reason_merged = item.merged_at.is_some_and(|at| self.since.includes(at));
        }
    }

    /// Replaces truncated inline comment lists with the full list, then trims
    /// every item's comments to the cutoff.
    async fn populate_comments(
        &self,
        items: &mut [Item],
        source: CommentSource,
    ) -> Result<(), DigestError> {
        let truncated: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.comments.total_count > item.comments.nodes.len())
            .map(|(index, _)| index)
            .collect();

        if !truncated.is_empty() {
            debug!(count = truncated.len(), "Backfilling comments");
        }

        let fetched: Vec<(Value, Vec<Comment>)> = stream::iter(&truncated)
            .map(|&index| {
                let item = &items[index];
                self.gql.fetch_all::<Comment>(
                    source.query(),
                    source.path(),
                    variables(json!({
                        "owner": item.repository.owner.login,
                        "name": item.repository.name,
                        "number": item.number,
                    })),
                )
            })
            .buffered(MAX_CONCURRENT_BACKFILLS)
            .try_collect()
            .await?;

        for (index, (_, comments)) in truncated.into_iter().zip(fetched) {
            items[index].comments.nodes = comments;
        }

        for item in items.iter_mut() {
            let nodes = std::mem::take(&mut item.comments.nodes);
            item.comments.nodes = self.trim_since(nodes);
        }

        Ok(())
    }
}

fn plain_comments(item: &Item) -> Vec<Activity> {
    item.comments
        .nodes
        .iter()
        .cloned()
        .map(Activity::Comment)
        .collect()
}

/// Collects every comment-like entry of a pull request, once per id.
///
/// Reviews come first so their comments carry the review state; a review
/// with no comments stands in for itself. Review-thread comments and plain
/// comments fill in whatever the reviews did not cover.
pub fn merge_pull_request_activity(pull: &Item) -> Vec<Activity> {
    let mut log = ActivityLog::default();

    let reviews = pull
        .latest_reviews
        .iter()
        .chain(pull.latest_opinionated_reviews.iter())
        .flat_map(|connection| connection.nodes.iter());
    for review in reviews {
        if review.comments.nodes.is_empty() {
            if review.state != ReviewState::Pending {
                log.insert(Activity::synthesized(review));
            }
            continue;
        }
        for comment in &review.comments.nodes {
            log.insert(Activity::ReviewComment {
                comment: comment.clone(),
                review_state: review.state,
            })
            .set_review_state(review.state);
        }
    }

    let thread_comments = pull
        .review_threads
        .iter()
        .flat_map(|threads| threads.nodes.iter())
        .flat_map(|thread| thread.comments.nodes.iter());
    for comment in thread_comments.chain(pull.comments.nodes.iter()) {
        log.insert(Activity::Comment(comment.clone()));
    }

    log.into_entries()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::types::{Connection, Owner, Review, ReviewThread};

    struct Offline;

    #[async_trait]
    impl Transport for Offline {
        async fn execute(&self, _query: &str, _variables: &Variables) -> Result<Value, DigestError> {
            Err(DigestError::Http("offline".to_string()))
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 2, day, hour, 0, 0).unwrap()
    }

    fn summarizer() -> Summarizer<Offline> {
        Summarizer::new(Since::new(at(10, 0)), QueryExecutor::new(Offline))
    }

    fn comment(id: &str, updated_at: DateTime<Utc>) -> Comment {
        Comment {
            id: id.to_string(),
            url: format!("https://github.com/o/r/pull/1#{id}"),
            body: format!("body of {id}"),
            updated_at,
            author: None,
        }
    }

    fn review(id: &str, state: ReviewState, comments: Vec<Comment>) -> Review {
        Review {
            id: id.to_string(),
            url: format!("https://github.com/o/r/pull/1#{id}"),
            body: String::new(),
            state,
            updated_at: at(12, 0),
            author: None,
            comments: Connection {
                total_count: comments.len(),
                nodes: comments,
            },
        }
    }

    fn item(updated_at: DateTime<Utc>) -> Item {
        Item {
            repository: Repository {
                owner: Owner {
                    login: "o".to_string(),
                },
                name: "r".to_string(),
                name_with_owner: "o/r".to_string(),
                url: "https://github.com/o/r".to_string(),
            },
            number: 1,
            url: "https://github.com/o/r/pull/1".to_string(),
            title: "A change".to_string(),
            state: "OPEN".to_string(),
            created_at: at(1, 0),
            updated_at,
            closed_at: None,
            merged_at: None,
            author: None,
            body: String::new(),
            comments: Connection::default(),
            labels: Connection::default(),
            latest_reviews: None,
            latest_opinionated_reviews: None,
            review_threads: None,
            comments_to_show: Vec::new(),
            reason_created: false,
            reason_closed: false,
            reason_merged: false,
            other_repo: None,
        }
    }

    #[test]
    fn trim_since_keeps_strictly_newer_sorted_and_is_idempotent() {
        let summarizer = summarizer();
        let nodes = vec![
            comment("late", at(14, 0)),
            comment("exact", at(10, 0)),
            comment("old", at(9, 23)),
            comment("early", at(11, 0)),
        ];

        let trimmed = summarizer.trim_since(nodes);
        let ids: Vec<&str> = trimmed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["early", "late"]);

        let again = summarizer.trim_since(trimmed.clone());
        assert_eq!(again, trimmed);
    }

    #[test]
    fn add_reasons_sets_every_flag() {
        let summarizer = summarizer();
        let mut fresh = item(at(12, 0));
        fresh.created_at = at(11, 0);
        fresh.closed_at = Some(at(12, 0));
        fresh.merged_at = Some(at(12, 0));

        let mut stale = item(at(12, 0));
        stale.closed_at = Some(at(9, 0));

        let mut items = vec![fresh, stale];
        summarizer.add_reasons(&mut items);

        assert!(items[0].reason_created);
        assert!(items[0].reason_closed);
        assert!(items[0].reason_merged);
        assert!(!items[1].reason_created);
        assert!(!items[1].reason_closed);
        assert!(!items[1].reason_merged);
    }

    #[test]
    fn merge_deduplicates_review_comments_seen_in_several_places() {
        let shared = comment("rc1", at(12, 0));
        let mut pull = item(at(12, 0));
        pull.latest_reviews = Some(Connection {
            total_count: 1,
            nodes: vec![review(
                "r1",
                ReviewState::Commented,
                vec![shared.clone()],
            )],
        });
        pull.latest_opinionated_reviews = Some(Connection {
            total_count: 1,
            nodes: vec![review(
                "r1",
                ReviewState::Commented,
                vec![shared.clone()],
            )],
        });
        pull.review_threads = Some(Connection {
            total_count: 1,
            nodes: vec![ReviewThread {
                comments: Connection {
                    total_count: 2,
                    nodes: vec![shared, comment("rc2", at(13, 0))],
                },
            }],
        });
        pull.comments = Connection {
            total_count: 1,
            nodes: vec![comment("c1", at(11, 0))],
        };

        let merged = merge_pull_request_activity(&pull);
        let ids: Vec<&str> = merged.iter().map(Activity::id).collect();
        assert_eq!(ids, ["rc1", "rc2", "c1"]);
        assert_eq!(merged[0].review_state(), Some(ReviewState::Commented));
        assert_eq!(merged[1].review_state(), None);
    }

    #[test]
    fn merge_synthesizes_completed_reviews_without_comments() {
        let mut pull = item(at(12, 0));
        pull.latest_opinionated_reviews = Some(Connection {
            total_count: 2,
            nodes: vec![
                review("approval", ReviewState::Approved, Vec::new()),
                review("draft", ReviewState::Pending, Vec::new()),
            ],
        });

        let merged = merge_pull_request_activity(&pull);
        assert_eq!(merged.len(), 1);
        assert!(matches!(
            &merged[0],
            Activity::Review { comment, review_state: ReviewState::Approved } if comment.id == "approval"
        ));
    }

    #[tokio::test]
    async fn transport_failure_propagates_out_of_operations() {
        let summarizer = summarizer();
        let err = summarizer.get_repo_issues("o/r").await.unwrap_err();
        assert!(matches!(err, DigestError::Http(_)));
    }

    #[tokio::test]
    async fn malformed_repo_fails_before_any_request() {
        let summarizer = summarizer();
        let err = summarizer.get_pull_requests("not-a-repo").await.unwrap_err();
        assert!(matches!(err, DigestError::Validation(_)));
        assert_eq!(summarizer.executor().requests_issued(), 0);
    }
}
