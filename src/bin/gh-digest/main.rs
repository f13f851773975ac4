use anyhow::Context;
use chrono::Utc;
use gh_digest::{
    GitHub, JsonDumpDir, QueryExecutor, Summarizer, collect_summaries, parse_args,
    report::{render_html, write_html, write_json},
};
use tracing::info;

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let request = match parse_args(std::env::args()) {
        Ok(request) => request,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            } else {
                return Err(err);
            }
        }
    };

    init_tracing(request.debug);

    let mut gql = QueryExecutor::new(GitHub::from_env()?);
    if let Some(dir) = &request.dump_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create '{}'", dir.display()))?;
        gql = gql.with_sink(JsonDumpDir::new(dir));
    }

    let summarizer = Summarizer::new(request.since, gql);
    let summaries = collect_summaries(&summarizer, &request.targets).await?;

    write_json(&request.json, &summaries).await?;
    let html = render_html(&summaries, request.since, Utc::now())?;
    write_html(&request.html, &html).await?;

    let items: usize = summaries.iter().map(|summary| summary.items.len()).sum();
    info!(
        requests = summarizer.executor().requests_issued(),
        "Digest complete"
    );
    println!(
        "Wrote {} ({} items in {} sections since {})",
        request.html.display(),
        items,
        summaries.len(),
        request.since
    );

    Ok(())
}
