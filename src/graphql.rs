//! GraphQL documents for the digest queries.
//!
//! Each query is assembled from its operation plus exactly the fragments it
//! references; GitHub rejects documents that define unused fragments.

use std::sync::LazyLock;

use crate::paginate::ResultPath;

const REPO_DATA_FRAGMENT: &str = r#"
fragment repoData on Repository {
    owner { login }
    name
    nameWithOwner
    url
}
"#;

const AUTHOR_DATA_FRAGMENT: &str = r#"
fragment authorData on Actor {
    login
    url
}
"#;

const COMMENT_DATA_FRAGMENT: &str = r#"
fragment commentData on IssueComment {
    id
    url
    body
    updatedAt
    author {
        ...authorData
    }
}
"#;

const REVIEW_COMMENT_DATA_FRAGMENT: &str = r#"
fragment reviewCommentData on PullRequestReviewComment {
    id
    url
    body
    updatedAt
    author {
        ...authorData
    }
}
"#;

const ISSUE_DATA_FRAGMENT: &str = r#"
fragment issueData on Issue {
    repository {
        ...repoData
    }
    number
    url
    title
    state
    createdAt
    updatedAt
    closedAt
    author {
        ...authorData
    }
    body
    comments(last: 100) {
        totalCount
        nodes {
            ...commentData
        }
    }
    labels(first: 10) {
        nodes {
            name
            color
        }
    }
}
"#;

const REVIEW_DATA_FRAGMENT: &str = r#"
fragment reviewData on PullRequestReview {
    id
    url
    body
    state
    updatedAt
    author {
        ...authorData
    }
    comments(first: 50) {
        totalCount
        nodes {
            ...reviewCommentData
        }
    }
}
"#;

const PULL_REQUEST_DATA_FRAGMENT: &str = r#"
fragment pullRequestData on PullRequest {
    repository {
        ...repoData
    }
    number
    url
    title
    state
    createdAt
    updatedAt
    closedAt
    mergedAt
    author {
        ...authorData
    }
    body
    comments(last: 100) {
        totalCount
        nodes {
            ...commentData
        }
    }
    labels(first: 10) {
        nodes {
            name
            color
        }
    }
    latestReviews(first: 30) {
        totalCount
        nodes {
            ...reviewData
        }
    }
    latestOpinionatedReviews(first: 30) {
        totalCount
        nodes {
            ...reviewData
        }
    }
    reviewThreads(first: 50) {
        totalCount
        nodes {
            comments(first: 30) {
                totalCount
                nodes {
                    ...reviewCommentData
                }
            }
        }
    }
}
"#;

const REPO_ISSUES_OPERATION: &str = r#"query getRepoIssues(
    $owner: String!
    $name: String!
    $since: DateTime!
    $after: String
) {
    repository(owner: $owner, name: $name) {
        ...repoData
        issues(first: 100, filterBy: {since: $since}, after: $after) {
            pageInfo { hasNextPage endCursor }
            nodes {
                ...issueData
            }
        }
    }
}
"#;

const PROJECT_ISSUES_OPERATION: &str = r#"query getProjectIssues(
    $org: String!
    $projectNumber: Int!
    $after: String
) {
    organization(login: $org) {
        project: projectV2(number: $projectNumber) {
            title
            url
            items(first: 100, after: $after) {
                pageInfo { hasNextPage endCursor }
                nodes {
                    content {
                        __typename
                        ... on Issue {
                            ...issueData
                        }
                    }
                }
            }
        }
    }
}
"#;

const ISSUE_COMMENTS_OPERATION: &str = r#"query getIssueComments(
    $owner: String!
    $name: String!
    $number: Int!
    $after: String
) {
    repository(owner: $owner, name: $name) {
        issue(number: $number) {
            comments(first: 100, after: $after) {
                pageInfo { hasNextPage endCursor }
                nodes {
                    ...commentData
                }
            }
        }
    }
}
"#;

const PULL_REQUEST_COMMENTS_OPERATION: &str = r#"query getPullRequestComments(
    $owner: String!
    $name: String!
    $number: Int!
    $after: String
) {
    repository(owner: $owner, name: $name) {
        pullRequest(number: $number) {
            comments(first: 100, after: $after) {
                pageInfo { hasNextPage endCursor }
                nodes {
                    ...commentData
                }
            }
        }
    }
}
"#;

const PULL_REQUESTS_OPERATION: &str = r#"query getPullRequests(
    $owner: String!
    $name: String!
    $after: String
) {
    repository(owner: $owner, name: $name) {
        ...repoData
        pullRequests(
            first: 25
            after: $after
            orderBy: {field: UPDATED_AT, direction: DESC}
        ) {
            pageInfo { hasNextPage endCursor }
            nodes {
                ...pullRequestData
            }
        }
    }
}
"#;

fn build_query(parts: &[&str]) -> String {
    parts.concat()
}

pub static REPO_ISSUES_QUERY: LazyLock<String> = LazyLock::new(|| {
    build_query(&[
        REPO_ISSUES_OPERATION,
        REPO_DATA_FRAGMENT,
        ISSUE_DATA_FRAGMENT,
        AUTHOR_DATA_FRAGMENT,
        COMMENT_DATA_FRAGMENT,
    ])
});

pub static PROJECT_ISSUES_QUERY: LazyLock<String> = LazyLock::new(|| {
    build_query(&[
        PROJECT_ISSUES_OPERATION,
        REPO_DATA_FRAGMENT,
        ISSUE_DATA_FRAGMENT,
        AUTHOR_DATA_FRAGMENT,
        COMMENT_DATA_FRAGMENT,
    ])
});

pub static ISSUE_COMMENTS_QUERY: LazyLock<String> = LazyLock::new(|| {
    build_query(&[
        ISSUE_COMMENTS_OPERATION,
        AUTHOR_DATA_FRAGMENT,
        COMMENT_DATA_FRAGMENT,
    ])
});

pub static PULL_REQUEST_COMMENTS_QUERY: LazyLock<String> = LazyLock::new(|| {
    build_query(&[
        PULL_REQUEST_COMMENTS_OPERATION,
        AUTHOR_DATA_FRAGMENT,
        COMMENT_DATA_FRAGMENT,
    ])
});

pub static PULL_REQUESTS_QUERY: LazyLock<String> = LazyLock::new(|| {
    build_query(&[
        PULL_REQUESTS_OPERATION,
        REPO_DATA_FRAGMENT,
        PULL_REQUEST_DATA_FRAGMENT,
        REVIEW_DATA_FRAGMENT,
        AUTHOR_DATA_FRAGMENT,
        COMMENT_DATA_FRAGMENT,
        REVIEW_COMMENT_DATA_FRAGMENT,
    ])
});

pub const REPOSITORY_PATH: ResultPath = ResultPath::new(&["repository"]);
pub const PROJECT_PATH: ResultPath = ResultPath::new(&["organization", "project"]);

pub const REPO_ISSUES_PATH: ResultPath = ResultPath::new(&["repository", "issues"]);
pub const PROJECT_ITEMS_PATH: ResultPath =
    ResultPath::new(&["organization", "project", "items"]);
pub const ISSUE_COMMENTS_PATH: ResultPath =
    ResultPath::new(&["repository", "issue", "comments"]);
pub const PULL_REQUEST_COMMENTS_PATH: ResultPath =
    ResultPath::new(&["repository", "pullRequest", "comments"]);
pub const PULL_REQUESTS_PATH: ResultPath = ResultPath::new(&["repository", "pullRequests"]);

/// The first line of a query document, for logging.
pub fn operation_line(query: &str) -> &str {
    query.trim_start().lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defined_fragments(query: &str) -> Vec<&str> {
        query
            .lines()
            .filter_map(|line| line.trim().strip_prefix("fragment "))
            .filter_map(|rest| rest.split_whitespace().next())
            .collect()
    }

    #[test]
    fn every_defined_fragment_is_used_and_every_used_fragment_defined() {
        for query in [
            &*REPO_ISSUES_QUERY,
            &*PROJECT_ISSUES_QUERY,
            &*ISSUE_COMMENTS_QUERY,
            &*PULL_REQUEST_COMMENTS_QUERY,
            &*PULL_REQUESTS_QUERY,
        ] {
            let defined = defined_fragments(query);
            for name in &defined {
                assert!(
                    query.contains(&format!("...{name}")),
                    "fragment {name} defined but unused in {}",
                    operation_line(query)
                );
            }
            for spread in query.split("...").skip(1) {
                let name: String = spread
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric())
                    .collect();
                if name == "on" || name.is_empty() {
                    continue;
                }
                assert!(
                    defined.contains(&name.as_str()),
                    "fragment {name} used but undefined in {}",
                    operation_line(query)
                );
            }
        }
    }

    #[test]
    fn operation_line_is_the_query_signature() {
        assert_eq!(operation_line(&REPO_ISSUES_QUERY), "query getRepoIssues(");
    }
}
