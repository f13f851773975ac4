use std::path::PathBuf;

use chrono::{DateTime, Duration, TimeZone, Utc};
use gh_digest::{
    Target,
    cli::{DigestRequest, parse_args_at},
    types::Repo,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 2, 24, 12, 0, 0).unwrap()
}

fn parse(args: &[&str]) -> anyhow::Result<DigestRequest> {
    parse_args_at(std::iter::once("gh-digest").chain(args.iter().copied()), now())
}

fn repo(value: &str) -> Repo {
    Repo::parse(value).unwrap()
}

#[test]
fn targets_keep_their_kind_and_order_by_kind() {
    let request = parse(&[
        "--since",
        "2022-02-10T00:00:00",
        "--pulls",
        "openedx/edx-platform",
        "--issues",
        "openedx/tcril-engineering",
        "--project",
        "openedx:8:openedx/tcril-engineering",
        "--issues",
        "https://github.com/nedbat/coveragepy",
    ])
    .unwrap();

    assert_eq!(
        request.targets,
        vec![
            Target::RepoIssues(repo("openedx/tcril-engineering")),
            Target::RepoIssues(repo("nedbat/coveragepy")),
            Target::ProjectIssues("openedx:8:openedx/tcril-engineering".parse().unwrap()),
            Target::PullRequests(repo("openedx/edx-platform")),
        ]
    );
}

#[test]
fn absolute_since_is_read_as_utc() {
    let request = parse(&["--since", "2022-02-10T00:00:00", "--issues", "o/r"]).unwrap();
    assert_eq!(
        request.since.as_datetime(),
        Utc.with_ymd_and_hms(2022, 2, 10, 0, 0, 0).unwrap()
    );

    let request = parse(&["-s", "2022-02-10", "--issues", "o/r"]).unwrap();
    assert_eq!(request.since.to_string(), "2022-02-10T00:00:00");
}

#[test]
fn relative_since_counts_back_from_now() {
    let request = parse(&["--since", "2w", "--issues", "o/r"]).unwrap();
    assert_eq!(request.since.as_datetime(), now() - Duration::weeks(2));

    let request = parse(&["--since", "1d6h", "--pulls", "o/r"]).unwrap();
    assert_eq!(
        request.since.as_datetime(),
        now() - Duration::days(1) - Duration::hours(6)
    );
}

#[test]
fn relative_since_accepts_fractions_and_unit_names() {
    let request = parse(&["--since", "7.5h", "--issues", "o/r"]).unwrap();
    assert_eq!(
        request.since.as_datetime(),
        now() - Duration::hours(7) - Duration::minutes(30)
    );

    let request = parse(&["--since", "10 weeks", "--issues", "o/r"]).unwrap();
    assert_eq!(request.since.as_datetime(), now() - Duration::weeks(10));
}

#[test]
fn relative_since_beyond_the_calendar_is_an_error() {
    let err = parse(&["--since", "99999999w", "--issues", "o/r"]).unwrap_err();
    assert!(err.to_string().contains("too far in the past"), "{err:#}");
}

#[test]
fn output_paths_have_defaults() {
    let request = parse(&["--since", "3d", "--issues", "o/r"]).unwrap();
    assert_eq!(request.html, PathBuf::from("digest.html"));
    assert_eq!(request.json, PathBuf::from("out_digest.json"));
    assert_eq!(request.dump_dir, None);
    assert!(!request.debug);

    let request = parse(&[
        "--since",
        "3d",
        "--issues",
        "o/r",
        "--html",
        "out/week.html",
        "--json",
        "out/week.json",
        "--dump-dir",
        "responses",
        "--debug",
    ])
    .unwrap();
    assert_eq!(request.html, PathBuf::from("out/week.html"));
    assert_eq!(request.json, PathBuf::from("out/week.json"));
    assert_eq!(request.dump_dir, Some(PathBuf::from("responses")));
    assert!(request.debug);
}

#[test]
fn at_least_one_target_is_required() {
    let err = parse(&["--since", "1w"]).unwrap_err();
    assert!(err.to_string().contains("at least one of"));
}

#[test]
fn since_is_required() {
    let err = parse(&["--issues", "o/r"]).unwrap_err();
    assert!(err.downcast_ref::<clap::Error>().is_some());
}

#[test]
fn malformed_values_are_rejected() {
    for args in [
        &["--since", "last tuesday", "--issues", "o/r"][..],
        &["--since", "1w", "--issues", "just-a-name"][..],
        &["--since", "1w", "--issues", "a/b/c"][..],
        &["--since", "1w", "--pulls", "/r"][..],
        &["--since", "1w", "--project", "openedx:eight:o/r"][..],
        &["--since", "1w", "--project", "openedx:8"][..],
        &["--since", "1w", "--issues", "https://gitlab.com/o/r"][..],
    ] {
        assert!(parse(args).is_err(), "accepted {args:?}");
    }
}

#[test]
fn help_is_a_clap_error() {
    let err = parse(&["--help"]).unwrap_err();
    let clap_err = err.downcast_ref::<clap::Error>().unwrap();
    assert_eq!(clap_err.kind(), clap::error::ErrorKind::DisplayHelp);
}
