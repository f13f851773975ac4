use std::{collections::HashMap, fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DigestError;

/// A GitHub repository identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repo {
    owner: String,
    name: String,
}

impl Repo {
    pub fn new(owner: &str, name: &str) -> Result<Self, DigestError> {
        if owner.is_empty() || name.is_empty() {
            return Err(DigestError::Validation(format!(
                "Repository must be in format 'owner/repo', got: '{owner}/{name}'"
            )));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// Parses `owner/repo` or a `https://github.com/owner/repo` URL.
    pub fn parse(value: &str) -> Result<Self, DigestError> {
        let value = value.trim();
        if value.starts_with("https://") {
            return Self::parse_url(value);
        }

        let parts: Vec<&str> = value.split('/').collect();
        if parts.len() != 2 {
            return Err(DigestError::Validation(format!(
                "Repository must be in format 'owner/repo', got: '{value}'"
            )));
        }
        Self::new(parts[0], parts[1])
    }

    fn parse_url(value: &str) -> Result<Self, DigestError> {
        let url = url::Url::parse(value)
            .map_err(|e| DigestError::Validation(format!("Invalid URL '{value}': {e}")))?;
        if url.host_str() != Some("github.com") {
            return Err(DigestError::Validation(format!(
                "URL must be a GitHub repository URL, got: '{value}'"
            )));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        match segments.as_slice() {
            [owner, name, ..] => Self::new(owner, name.trim_end_matches(".git")),
            _ => Err(DigestError::Validation(format!(
                "URL must be in format https://github.com/owner/repo, got: '{value}'"
            ))),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for Repo {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// An organization project whose issues are summarized, plus the repository
/// most of its issues live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTarget {
    pub org: String,
    pub number: u64,
    pub home_repo: Repo,
}

impl FromStr for ProjectTarget {
    type Err = DigestError;

    /// Parses `org:number:owner/repo`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            DigestError::Validation(format!(
                "Project must be in format 'org:number:owner/repo', got: '{s}'"
            ))
        };

        let mut parts = s.trim().splitn(3, ':');
        let (Some(org), Some(number), Some(home_repo)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if org.is_empty() {
            return Err(invalid());
        }
        let number = number.parse::<u64>().map_err(|_| invalid())?;

        Ok(Self {
            org: org.to_string(),
            number,
            home_repo: Repo::parse(home_repo)?,
        })
    }
}

/// The cutoff that defines "recent" for one run.
///
/// Everything is compared strictly: a timestamp equal to the cutoff is not
/// recent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Since(DateTime<Utc>);

impl Since {
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Parses an absolute timestamp: RFC 3339, ISO-8601 without a timezone
    /// (read as UTC), or a bare date.
    pub fn parse(value: &str) -> Result<Self, DigestError> {
        let value = value.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(value) {
            return Ok(Self(at.with_timezone(&Utc)));
        }
        if let Ok(at) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
            return Ok(Self(at.and_utc()));
        }
        if let Some(at) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
        {
            return Ok(Self(at.and_utc()));
        }
        Err(DigestError::Validation(format!(
            "Invalid timestamp '{value}', expected e.g. 2022-02-10T00:00:00"
        )))
    }

    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// True when `at` is strictly after the cutoff.
    pub fn includes(&self, at: DateTime<Utc>) -> bool {
        at > self.0
    }

    /// The cutoff as the API's `DateTime` scalar.
    pub fn to_graphql(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl fmt::Display for Since {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S"))
    }
}

/// Anything that can be filtered and ordered by its last update.
pub trait Timestamped {
    fn updated_at(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Repo,
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActivityKind {
    #[serde(rename = "issues")]
    Issues,
    #[serde(rename = "pull requests")]
    PullRequests,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Repo => write!(f, "repo"),
            ContainerKind::Project => write!(f, "project"),
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityKind::Issues => write!(f, "issues"),
            ActivityKind::PullRequests => write!(f, "pull requests"),
        }
    }
}

/// The repository or project one digest section is scoped to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Container {
    pub name: String,
    pub owner: Option<String>,
    pub url: String,
    pub container_kind: ContainerKind,
    pub kind: ActivityKind,
}

impl Container {
    pub fn from_repository(repository: Repository, kind: ActivityKind) -> Self {
        Self {
            name: repository.name_with_owner,
            owner: Some(repository.owner.login),
            url: repository.url,
            container_kind: ContainerKind::Repo,
            kind,
        }
    }

    pub fn from_project(project: Project, kind: ActivityKind) -> Self {
        Self {
            name: project.title,
            owner: None,
            url: project.url,
            container_kind: ContainerKind::Project,
            kind,
        }
    }
}

/// A container together with its recent items, ready for the report.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub container: Container,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Owner {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub owner: Owner,
    pub name: String,
    pub name_with_owner: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Project {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Actor {
    pub login: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Label {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// A GraphQL connection as it arrives inline in a node.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    #[serde(default)]
    pub total_count: usize,
    pub nodes: Vec<T>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self {
            total_count: 0,
            nodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub body: String,
    pub updated_at: DateTime<Utc>,
    pub author: Option<Actor>,
}

impl Timestamped for Comment {
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Pending,
    Commented,
    Approved,
    ChangesRequested,
    Dismissed,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ReviewState::Pending => "pending",
            ReviewState::Commented => "commented",
            ReviewState::Approved => "approved",
            ReviewState::ChangesRequested => "changes requested",
            ReviewState::Dismissed => "dismissed",
            ReviewState::Unknown => "reviewed",
        };
        write!(f, "{text}")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub body: String,
    pub state: ReviewState,
    pub updated_at: DateTime<Utc>,
    pub author: Option<Actor>,
    #[serde(default)]
    pub comments: Connection<Comment>,
}

impl Review {
    fn as_comment(&self) -> Comment {
        Comment {
            id: self.id.clone(),
            url: self.url.clone(),
            body: self.body.clone(),
            updated_at: self.updated_at,
            author: self.author.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReviewThread {
    pub comments: Connection<Comment>,
}

/// One comment-like entry shown under an item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Activity {
    /// A plain issue or pull request comment, or a review-thread comment
    /// whose review is unknown.
    Comment(Comment),
    /// A comment attached to a review.
    ReviewComment {
        #[serde(flatten)]
        comment: Comment,
        review_state: ReviewState,
    },
    /// A completed review that carried no comments of its own.
    Review {
        #[serde(flatten)]
        comment: Comment,
        review_state: ReviewState,
    },
}

impl Activity {
    pub fn synthesized(review: &Review) -> Self {
        Activity::Review {
            comment: review.as_comment(),
            review_state: review.state,
        }
    }

    pub fn comment(&self) -> &Comment {
        match self {
            Activity::Comment(comment)
            | Activity::ReviewComment { comment, .. }
            | Activity::Review { comment, .. } => comment,
        }
    }

    pub fn id(&self) -> &str {
        &self.comment().id
    }

    pub fn author(&self) -> Option<&Actor> {
        self.comment().author.as_ref()
    }

    pub fn body(&self) -> &str {
        &self.comment().body
    }

    pub fn url(&self) -> &str {
        &self.comment().url
    }

    pub fn review_state(&self) -> Option<ReviewState> {
        match self {
            Activity::Comment(_) => None,
            Activity::ReviewComment { review_state, .. } | Activity::Review { review_state, .. } => {
                Some(*review_state)
            }
        }
    }

    /// Marks the entry as belonging to a review in `state`.
    pub fn set_review_state(&mut self, state: ReviewState) {
        match self {
            Activity::Comment(comment) => {
                *self = Activity::ReviewComment {
                    comment: comment.clone(),
                    review_state: state,
                };
            }
            Activity::ReviewComment { review_state, .. } | Activity::Review { review_state, .. } => {
                *review_state = state;
            }
        }
    }
}

impl Timestamped for Activity {
    fn updated_at(&self) -> DateTime<Utc> {
        self.comment().updated_at
    }
}

/// Comment-like entries keyed by id, in first-seen order.
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: Vec<Activity>,
    index: HashMap<String, usize>,
}

impl ActivityLog {
    /// Inserts `activity` unless its id is already present, returning the
    /// entry stored under that id either way.
    pub fn insert(&mut self, activity: Activity) -> &mut Activity {
        let next = self.entries.len();
        let slot = *self.index.entry(activity.id().to_string()).or_insert(next);
        if slot == next {
            self.entries.push(activity);
        }
        &mut self.entries[slot]
    }

    pub fn into_entries(self) -> Vec<Activity> {
        self.entries
    }
}

/// An issue or pull request.
///
/// Decoded straight from the GraphQL node; the derived fields at the end are
/// filled in by the summarizer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub repository: Repository,
    pub number: u64,
    pub url: String,
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
    pub author: Option<Actor>,
    #[serde(default)]
    pub body: String,
    pub comments: Connection<Comment>,
    #[serde(default)]
    pub labels: Connection<Label>,

    #[serde(default, skip_serializing)]
    pub latest_reviews: Option<Connection<Review>>,
    #[serde(default, skip_serializing)]
    pub latest_opinionated_reviews: Option<Connection<Review>>,
    #[serde(default, skip_serializing)]
    pub review_threads: Option<Connection<ReviewThread>>,

    #[serde(skip_deserializing, rename = "comments_to_show")]
    pub comments_to_show: Vec<Activity>,
    #[serde(skip_deserializing)]
    pub reason_created: bool,
    #[serde(skip_deserializing)]
    pub reason_closed: bool,
    #[serde(skip_deserializing)]
    pub reason_merged: bool,
    #[serde(
        skip_deserializing,
        rename = "other_repo",
        skip_serializing_if = "Option::is_none"
    )]
    pub other_repo: Option<bool>,
}

impl Timestamped for Item {
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
