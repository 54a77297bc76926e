use anyhow::Context;
use clap::Parser;
use homework_checker::checker::Checker;
use homework_checker::report::{self, MdWriter};
use homework_checker::util::git;
use tracing_subscriber::EnvFilter;

mod opt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = opt::Opts::parse();
    let default_level = if opts.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match opts.cmd {
        opt::SubCmd::Check(cmd) => check(cmd).await,
        opt::SubCmd::RepoName(cmd) => repo_name(cmd),
    }
}

async fn check(cmd: opt::CheckSubCmd) -> anyhow::Result<()> {
    tracing::debug!(file = %cmd.input.display(), "Reading job file");
    let checker = Checker::from_job_file(&cmd.input)?;
    let results = checker.check_all_homeworks().await;

    let mut writer = MdWriter::new();
    writer.update(&results);
    tracing::debug!(file = %cmd.output.display(), "Writing report");
    writer.write_md_file(&cmd.output)?;

    if let Some(json_path) = &cmd.json {
        report::write_json_file(&results, json_path)?;
    }
    Ok(())
}

fn repo_name(cmd: opt::RepoNameSubCmd) -> anyhow::Result<()> {
    let parts = git::parse_git_url(&cmd.url)
        .with_context(|| format!("'{}' does not look like a git url", cmd.url))?;
    match cmd.kind {
        opt::RepoKind::Wiki => println!("{}", git::wiki_url(&parts)),
        opt::RepoKind::Code => println!("{}", git::code_url(&parts)),
    }
    Ok(())
}
