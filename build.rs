//! Embeds a human-readable version string as `BUILD_INFO_HUMAN`.
//!
//! The string is `<crate version> (<git version>) <rustc version>`, with any
//! part that cannot be determined left out. The git version is
//! `git describe --tags --dirty` when a tag exists, otherwise
//! `v<crate version>-<YYYYmmddHHMMSS>-<short sha>[+dirty]`.

use std::process::Command;

use chrono::{DateTime, Utc};

const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

fn main() {
    for path in ["src", "build.rs", "Cargo.toml", "Cargo.lock", ".git/HEAD"] {
        println!("cargo:rerun-if-changed={path}");
    }

    let version = env!("CARGO_PKG_VERSION");
    let parts: Vec<String> = [
        Some(version.to_string()),
        Some(format!("({})", git_version(version))),
        run("rustc", &["--version"]),
    ]
    .into_iter()
    .flatten()
    .collect();

    println!("cargo:rustc-env=BUILD_INFO_HUMAN={}", parts.join(" "));
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn git(args: &[&str]) -> Option<String> {
    run("git", args)
}

/// `None` outside a git checkout.
fn dirty() -> Option<bool> {
    // `cargo install --git` drops .cargo-ok into the checkout.
    git(&["status", "--porcelain"])
        .map(|status| status.lines().any(|line| line.get(3..) != Some(".cargo-ok")))
        .or_else(|| git(&["rev-parse", "--git-dir"]).map(|_| false))
}

fn git_version(version: &str) -> String {
    match git(&["describe", "--tags", "--always", "--dirty"]) {
        Some(described) if described.contains("-g") || described.starts_with('v') => described,
        _ => pseudo_version(version),
    }
}

fn pseudo_version(version: &str) -> String {
    let sha = git(&["rev-parse", "--short=12", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let is_dirty = dirty().unwrap_or(false);

    // Clean builds are stamped with the commit time so rebuilding the same
    // commit yields the same version.
    let committed = git(&["log", "-1", "--format=%ct"])
        .and_then(|secs| secs.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));
    let stamp = match committed {
        Some(at) if !is_dirty => at,
        _ => Utc::now(),
    };

    let suffix = if is_dirty { "+dirty" } else { "" };
    format!("v{version}-{}-{sha}{suffix}", stamp.format(STAMP_FORMAT))
}
