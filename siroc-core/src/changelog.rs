//! Changelog generation from conventional commits.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::vcs::{LogEntry, VersionControl};

/// Commit types that make it into the changelog, in section order.
pub const COMMIT_TYPES: [(&str, &str); 8] = [
    ("fix", "🐛 Bug Fixes"),
    ("feat", "🚀 Features"),
    ("refactor", "💅 Refactors"),
    ("perf", "🔥 Performance"),
    ("examples", "📝 Examples"),
    ("chore", "🏡 Chore"),
    ("test", "👓 Tests"),
    ("types", "🇹 Types"),
];

const THANKS_TITLE: &str = "💖 Thanks to";

static FIXES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((fixes) #\d+\)").expect("valid regex"));
static REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#[0-9]+").expect("valid regex"));
static SCOPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((.*)\)").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionalCommit {
    pub entry: LogEntry,
    pub kind: String,
    pub scope: String,
    pub message: String,
    pub references: Vec<String>,
}

/// Parses `type(scope): message` subjects. Subjects without a colon are skipped.
pub fn parse_commits(entries: &[LogEntry]) -> Vec<ConventionalCommit> {
    entries
        .iter()
        .filter_map(|entry| {
            let (kind, message) = entry.message.split_once(':')?;
            let message = FIXES.replace_all(message, "");
            let references: Vec<String> = REFERENCE
                .find_iter(&message)
                .map(|m| m.as_str().to_string())
                .collect();
            let message = REFERENCE
                .replace_all(&message, "")
                .replace("()", "")
                .trim()
                .to_string();
            let scope = SCOPE
                .captures(kind)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
                .unwrap_or("general")
                .to_string();
            Some(ConventionalCommit {
                entry: entry.clone(),
                kind: kind.split('(').next().unwrap_or(kind).trim().to_string(),
                scope,
                message,
                references,
            })
        })
        .collect()
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Renders the Markdown document.
///
/// Commits of unknown types or with the `deps` scope are left out. Authors
/// whose name contains one of `known_authors` (case-insensitively) are not
/// thanked.
pub fn generate_markdown(commits: &[ConventionalCommit], known_authors: &[String]) -> String {
    let commits: Vec<&ConventionalCommit> = commits
        .iter()
        .filter(|c| COMMIT_TYPES.iter().any(|(kind, _)| *kind == c.kind) && c.scope != "deps")
        .collect();

    let mut markdown = String::new();
    for (kind, title) in COMMIT_TYPES {
        let mut scopes: IndexMap<&str, Vec<&ConventionalCommit>> = IndexMap::new();
        for commit in commits.iter().filter(|c| c.kind == kind) {
            scopes.entry(commit.scope.as_str()).or_default().push(commit);
        }
        if scopes.is_empty() {
            continue;
        }

        markdown.push_str(&format!("\n\n### {}\n\n", title));
        for (scope, group) in scopes {
            markdown.push_str(&format!("- `{}`\n", scope));
            for commit in group {
                let references = commit.references.join(", ");
                let separator = if references.is_empty() { "" } else { " " };
                markdown.push_str(&format!(
                    "  - {}{}{}\n",
                    references,
                    separator,
                    capitalize(&commit.message)
                ));
            }
        }
    }

    let known: Vec<String> = known_authors.iter().map(|a| a.to_lowercase()).collect();
    let mut authors: Vec<&str> = commits
        .iter()
        .map(|c| c.entry.author_name.as_str())
        .filter(|name| {
            let name = name.to_lowercase();
            !known.iter().any(|k| !k.is_empty() && name.contains(k.as_str()))
        })
        .collect();
    authors.sort_unstable();
    authors.dedup();

    if !authors.is_empty() {
        markdown.push_str(&format!("\n\n### {}\n\n", THANKS_TITLE));
        let lines: Vec<String> = authors.iter().map(|name| format!("- {}", name)).collect();
        markdown.push_str(&lines.join("\n"));
    }

    markdown.trim().to_string()
}

/// Changelog for the commits between the last tag and the current branch.
pub async fn generate_changelog(vcs: &dyn VersionControl, known_authors: &[String]) -> String {
    let branch = vcs.branch().await;
    let last_tag = vcs.last_tag().await;
    info!("{}...{}", branch, last_tag.as_deref().unwrap_or(""));
    let entries = vcs.log(last_tag.as_deref(), &branch).await;
    generate_markdown(&parse_commits(&entries), known_authors)
}
