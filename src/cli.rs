use std::{path::PathBuf, sync::LazyLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use regex::Regex;

use crate::{
    digest::Target,
    types::{ProjectTarget, Repo, Since},
};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

#[derive(Parser, Debug)]
#[command(
    name = "gh-digest",
    about = "Summarize recent issue and pull request activity across GitHub repositories and projects into one HTML digest"
)]
#[command(long_version = BUILD_INFO_HUMAN)]
struct CliArgs {
    /// Only show activity after this time: 2022-02-10T00:00:00 (UTC), an RFC 3339 timestamp, a date, or a duration ago such as 2w, 3d12h, 7.5h or "10 weeks"
    #[arg(short = 's', long, value_name = "WHEN")]
    pub since: String,

    /// Summarize issues of a repository (can specify multiple)
    #[arg(long = "issues", value_name = "OWNER/REPO", help_heading = "Targets")]
    pub issues: Vec<String>,

    /// Summarize issues on an organization project, with the repository most of them live in (can specify multiple)
    #[arg(
        long = "project",
        value_name = "ORG:NUMBER:OWNER/REPO",
        help_heading = "Targets"
    )]
    pub projects: Vec<String>,

    /// Summarize pull requests of a repository (can specify multiple)
    #[arg(long = "pulls", value_name = "OWNER/REPO", help_heading = "Targets")]
    pub pulls: Vec<String>,

    /// Write every raw GraphQL response to this directory
    #[arg(long = "dump-dir", value_name = "DIR")]
    pub dump_dir: Option<PathBuf>,

    /// Where to write the HTML digest
    #[arg(long, value_name = "FILE", default_value = "digest.html")]
    pub html: PathBuf,

    /// Where to write the JSON snapshot
    #[arg(long, value_name = "FILE", default_value = "out_digest.json")]
    pub json: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Everything one digest run needs.
#[derive(Debug, Clone)]
pub struct DigestRequest {
    pub since: Since,
    pub targets: Vec<Target>,
    pub dump_dir: Option<PathBuf>,
    pub html: PathBuf,
    pub json: PathBuf,
    pub debug: bool,
}

// Units run largest first; anything after the unit letter is its spelled-out
// name (`w`, `wk`, `weeks`).
static DURATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:([.\d]+)w[a-z]*)?(?:([.\d]+)d[a-z]*)?(?:([.\d]+)h[a-z]*)?(?:([.\d]+)m[a-z]*)?(?:([.\d]+)s[a-z]*)?$",
    )
    .expect("Failed to compile duration pattern")
});

const UNIT_SECONDS: [f64; 5] = [604_800.0, 86_400.0, 3_600.0, 60.0, 1.0];

/// Parses a duration such as `2w`, `3d12h`, `7.5h` or `10 weeks`.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let captures = DURATION_PATTERN
        .captures(&compact)
        .filter(|_| !compact.is_empty())
        .with_context(|| format!("Invalid duration '{value}'. Supported units: w, d, h, m, s"))?;

    let seconds = UNIT_SECONDS
        .iter()
        .enumerate()
        .try_fold(0.0, |total, (index, unit)| -> Result<f64> {
            let Some(amount) = captures.get(index + 1) else {
                return Ok(total);
            };
            let amount = amount.as_str();
            let amount: f64 = amount
                .parse()
                .with_context(|| format!("Invalid number '{amount}' in duration '{value}'"))?;
            Ok(total + amount * unit)
        })?;

    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() || millis >= i64::MAX as f64 {
        anyhow::bail!("Duration '{value}' is too large");
    }
    Duration::try_milliseconds(millis as i64)
        .with_context(|| format!("Duration '{value}' is too large"))
}

/// Parses `--since`: an absolute timestamp, or a duration counted back from
/// `now`.
pub fn parse_since(value: &str, now: DateTime<Utc>) -> Result<Since> {
    if let Ok(since) = Since::parse(value) {
        return Ok(since);
    }
    let ago = parse_duration(value).with_context(|| {
        format!("Invalid --since '{value}': expected a timestamp like 2022-02-10T00:00:00 or a duration like 2w")
    })?;
    let at = now
        .checked_sub_signed(ago)
        .with_context(|| format!("--since '{value}' is too far in the past"))?;
    Ok(Since::new(at))
}

fn collect_targets(cli: &CliArgs) -> Result<Vec<Target>> {
    let mut targets = Vec::new();

    for repo in &cli.issues {
        let repo = Repo::parse(repo).with_context(|| format!("Invalid --issues '{repo}'"))?;
        targets.push(Target::RepoIssues(repo));
    }

    for project in &cli.projects {
        let project: ProjectTarget = project
            .parse()
            .with_context(|| format!("Invalid --project '{project}'"))?;
        targets.push(Target::ProjectIssues(project));
    }

    for repo in &cli.pulls {
        let repo = Repo::parse(repo).with_context(|| format!("Invalid --pulls '{repo}'"))?;
        targets.push(Target::PullRequests(repo));
    }

    if targets.is_empty() {
        anyhow::bail!("Must specify at least one of: --issues, --project, or --pulls");
    }

    Ok(targets)
}

fn build_request(cli: CliArgs, now: DateTime<Utc>) -> Result<DigestRequest> {
    let since = parse_since(&cli.since, now)?;
    let targets = collect_targets(&cli)?;

    Ok(DigestRequest {
        since,
        targets,
        dump_dir: cli.dump_dir,
        html: cli.html,
        json: cli.json,
        debug: cli.debug,
    })
}

/// Parses command-line arguments into a digest request.
///
/// Relative `--since` durations are resolved against `now`.
pub fn parse_args_at<I, T>(args: I, now: DateTime<Utc>) -> Result<DigestRequest>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    build_request(cli, now)
}

/// Parses command-line arguments into a digest request.
pub fn parse_args<I, T>(args: I) -> Result<DigestRequest>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    parse_args_at(args, Utc::now())
}
