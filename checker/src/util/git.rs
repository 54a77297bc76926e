//! Parsing of git repository URLs, used to print canonical remotes for a
//! submission repository and its wiki.

use once_cell::sync::Lazy;
use regex::Regex;

static GIT_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:git@|https://)([\w\-.]+)[:/]([\w\-./]+)/([\w\-]+)(?:\.git)?$",
    )
    .expect("valid git url regex")
});

/// Domain, user and project parsed from a git url (https or ssh).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitUrlParts {
    pub domain: String,
    pub user: String,
    pub project: String,
}

/// Parse the git url. `None` when it does not look like one.
pub fn parse_git_url(git_url: &str) -> Option<GitUrlParts> {
    let captures = GIT_URL_REGEX.captures(git_url)?;
    Some(GitUrlParts {
        domain: captures[1].to_owned(),
        user: captures[2].to_owned(),
        project: captures[3].to_owned(),
    })
}

/// The canonical ssh remote of the code repository.
pub fn code_url(parts: &GitUrlParts) -> String {
    format!(
        "git@{}:{}/{}.git",
        parts.domain, parts.user, parts.project
    )
}

/// The canonical ssh remote of the repository's wiki.
pub fn wiki_url(parts: &GitUrlParts) -> String {
    format!(
        "git@{}:{}/{}.wiki.git",
        parts.domain, parts.user, parts.project
    )
}
