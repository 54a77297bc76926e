use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(name = "hwcheck", version, about = "Grade student homework submissions")]
pub struct Opts {
    #[clap(subcommand)]
    pub cmd: SubCmd,

    /// Make the output verbose.
    #[clap(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCmd {
    /// Check all homeworks described in a job file and write a report
    #[clap(name = "check")]
    Check(CheckSubCmd),

    /// Print the canonical git remote for a repository url
    #[clap(name = "repo-name")]
    RepoName(RepoNameSubCmd),
}

#[derive(Args, Debug, Clone)]
pub struct CheckSubCmd {
    /// An input *.yml file with the job definition.
    #[clap(long, short, value_name = "job-file")]
    pub input: PathBuf,

    /// An output *.md file with the results.
    #[clap(long, short, value_name = "report-file")]
    pub output: PathBuf,

    /// Also dump the raw results to a JSON file.
    #[clap(long, value_name = "json-file")]
    pub json: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RepoNameSubCmd {
    /// Url of a git repository (https or ssh).
    pub url: String,

    /// Which remote to print.
    #[clap(value_enum)]
    pub kind: RepoKind,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum RepoKind {
    Wiki,
    Code,
}
