//! Digest output: a JSON snapshot and an HTML page.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_humanize::HumanTime;
use minijinja::{Environment, context};
use serde::Serialize;

use crate::types::{Activity, Actor, Item, Since, Summary};

const DIGEST_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Activity since {{ since }}</title>
<style>
body { font-family: sans-serif; max-width: 60em; margin: 1em auto; }
.kind { color: #777; font-size: 80%; font-weight: normal; }
.badge { font-size: 70%; padding: 0 .4em; margin-left: .3em; border-radius: .3em; background: #ddf; }
.badge.other { background: #fdd; }
.meta { color: #555; margin: 0; }
.comment { white-space: pre-wrap; margin: .3em 0 .6em 0; }
.empty { color: #999; }
</style>
</head>
<body>
<h1>Activity since {{ since }}</h1>
<p class="meta">Generated {{ generated_at }}</p>
{% for section in sections %}
<section>
<h2><a href="{{ section.url }}">{{ section.name }}</a> <span class="kind">{{ section.container_kind }} {{ section.kind }}</span></h2>
{% if not section.items %}<p class="empty">Nothing new.</p>{% endif %}
{% for item in section.items %}
<div class="item">
<h3><a href="{{ item.url }}">#{{ item.number }}</a> {{ item.title }}
{%- for reason in item.reasons %}<span class="badge">{{ reason }}</span>{% endfor %}
{%- if item.other_repo %}<span class="badge other">{{ item.repository }}</span>{% endif %}</h3>
<p class="meta">{{ item.state | lower }}, by {{ item.author }}, updated {{ item.age }}</p>
<ul>
{% for comment in item.comments %}
<li><a href="{{ comment.url }}">{{ comment.author }}</a>
{%- if comment.review_state %} <span class="badge">{{ comment.review_state }}</span>{% endif %}, {{ comment.age }}
<div class="comment">{{ comment.body }}</div></li>
{% endfor %}
</ul>
</div>
{% endfor %}
</section>
{% endfor %}
</body>
</html>
"#;

#[derive(Debug, Serialize)]
struct SectionView {
    name: String,
    url: String,
    container_kind: String,
    kind: String,
    items: Vec<ItemView>,
}

#[derive(Debug, Serialize)]
struct ItemView {
    number: u64,
    title: String,
    url: String,
    repository: String,
    state: String,
    author: String,
    age: String,
    reasons: Vec<&'static str>,
    other_repo: bool,
    comments: Vec<CommentView>,
}

#[derive(Debug, Serialize)]
struct CommentView {
    author: String,
    url: String,
    body: String,
    review_state: Option<String>,
    age: String,
}

fn author_name(author: Option<&Actor>) -> String {
    author.map_or_else(|| "ghost".to_string(), |a| a.login.clone())
}

fn age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    HumanTime::from(at - now).to_string()
}

fn item_reasons(item: &Item) -> Vec<&'static str> {
    [
        (item.reason_created, "new"),
        (item.reason_closed, "closed"),
        (item.reason_merged, "merged"),
    ]
    .into_iter()
    .filter_map(|(flag, label)| flag.then_some(label))
    .collect()
}

fn comment_view(activity: &Activity, now: DateTime<Utc>) -> CommentView {
    CommentView {
        author: author_name(activity.author()),
        url: activity.url().to_string(),
        body: activity.body().to_string(),
        review_state: activity.review_state().map(|state| state.to_string()),
        age: age(activity.comment().updated_at, now),
    }
}

fn item_view(item: &Item, now: DateTime<Utc>) -> ItemView {
    ItemView {
        number: item.number,
        title: item.title.clone(),
        url: item.url.clone(),
        repository: item.repository.name_with_owner.clone(),
        state: item.state.clone(),
        author: author_name(item.author.as_ref()),
        age: age(item.updated_at, now),
        reasons: item_reasons(item),
        other_repo: item.other_repo.unwrap_or(false),
        comments: item
            .comments_to_show
            .iter()
            .map(|activity| comment_view(activity, now))
            .collect(),
    }
}

fn section_view(summary: &Summary, now: DateTime<Utc>) -> SectionView {
    SectionView {
        name: summary.container.name.clone(),
        url: summary.container.url.clone(),
        container_kind: summary.container.container_kind.to_string(),
        kind: summary.container.kind.to_string(),
        items: summary
            .items
            .iter()
            .map(|item| item_view(item, now))
            .collect(),
    }
}

/// Renders the HTML digest. Ages are relative to `now`.
pub fn render_html(summaries: &[Summary], since: Since, now: DateTime<Utc>) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("digest.html", DIGEST_TEMPLATE)
        .context("Invalid digest template")?;
    let template = env.get_template("digest.html")?;

    let sections: Vec<SectionView> = summaries
        .iter()
        .map(|summary| section_view(summary, now))
        .collect();

    template
        .render(context! {
            since => since.to_string(),
            generated_at => now.format("%Y-%m-%d %H:%M UTC").to_string(),
            sections => sections,
        })
        .context("Failed to render digest")
}

/// Writes the summaries as pretty-printed JSON.
pub async fn write_json(path: &Path, summaries: &[Summary]) -> Result<()> {
    let text = serde_json::to_string_pretty(summaries).context("Failed to serialize digest")?;
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write '{}'", path.display()))
}

pub async fn write_html(path: &Path, html: &str) -> Result<()> {
    tokio::fs::write(path, html)
        .await
        .with_context(|| format!("Failed to write '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::types::{
        ActivityKind, Comment, Connection, Container, Owner, Project, Repository, ReviewState,
    };

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 2, day, 0, 0, 0).unwrap()
    }

    fn sample() -> Vec<Summary> {
        let item = Item {
            repository: Repository {
                owner: Owner {
                    login: "openedx".to_string(),
                },
                name: "other".to_string(),
                name_with_owner: "openedx/other".to_string(),
                url: "https://github.com/openedx/other".to_string(),
            },
            number: 42,
            url: "https://github.com/openedx/other/issues/42".to_string(),
            title: "Fix <b>things</b>".to_string(),
            state: "OPEN".to_string(),
            created_at: at(11),
            updated_at: at(12),
            closed_at: None,
            merged_at: None,
            author: None,
            body: String::new(),
            comments: Connection::default(),
            labels: Connection::default(),
            latest_reviews: None,
            latest_opinionated_reviews: None,
            review_threads: None,
            comments_to_show: vec![Activity::Review {
                comment: Comment {
                    id: "r1".to_string(),
                    url: "https://github.com/openedx/other/issues/42#r1".to_string(),
                    body: "Looks good".to_string(),
                    updated_at: at(12),
                    author: Some(Actor {
                        login: "nedbat".to_string(),
                        url: None,
                    }),
                },
                review_state: ReviewState::Approved,
            }],
            reason_created: true,
            reason_closed: false,
            reason_merged: false,
            other_repo: Some(true),
        };

        vec![
            Summary {
                container: Container::from_project(
                    Project {
                        title: "Core Roadmap".to_string(),
                        url: "https://github.com/orgs/openedx/projects/8".to_string(),
                    },
                    ActivityKind::Issues,
                ),
                items: vec![item],
            },
            Summary {
                container: Container::from_repository(
                    Repository {
                        owner: Owner {
                            login: "openedx".to_string(),
                        },
                        name: "quiet".to_string(),
                        name_with_owner: "openedx/quiet".to_string(),
                        url: "https://github.com/openedx/quiet".to_string(),
                    },
                    ActivityKind::PullRequests,
                ),
                items: Vec::new(),
            },
        ]
    }

    #[test]
    fn html_lists_sections_items_and_comments() {
        let html = render_html(&sample(), Since::new(at(10)), at(14)).unwrap();

        assert!(html.contains("Activity since 2022-02-10T00:00:00"));
        assert!(html.contains("Core Roadmap"));
        assert!(html.contains("project issues"));
        assert!(html.contains("repo pull requests"));
        assert!(html.contains("#42"));
        assert!(html.contains(r#"<span class="badge">new</span>"#));
        assert!(html.contains(r#"<span class="badge other">"#));
        assert!(html.contains("by ghost"));
        assert!(html.contains("nedbat"));
        assert!(html.contains("approved"));
        assert!(html.contains("Looks good"));
        assert!(html.contains("Nothing new."));
    }

    #[test]
    fn html_escapes_titles() {
        let html = render_html(&sample(), Since::new(at(10)), at(14)).unwrap();
        assert!(html.contains("Fix &lt;b&gt;things"));
        assert!(!html.contains("<b>things</b>"));
    }

    #[test]
    fn snapshot_uses_digest_field_names() {
        let value = serde_json::to_value(sample()).unwrap();
        let section = &value[0];
        assert_eq!(section["container"]["container_kind"], "project");
        assert_eq!(section["container"]["kind"], "issues");
        assert_eq!(value[1]["container"]["kind"], "pull requests");

        let item = &section["items"][0];
        assert_eq!(item["reasonCreated"], true);
        assert_eq!(item["reasonClosed"], false);
        assert_eq!(item["reasonMerged"], false);
        assert_eq!(item["other_repo"], true);
        assert_eq!(item["comments_to_show"][0]["type"], "review");
        assert_eq!(item["comments_to_show"][0]["review_state"], "APPROVED");
    }

    #[tokio::test]
    async fn json_snapshot_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out_digest.json");
        write_json(&path, &sample()).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
    }
}
