mod common;

use siroc_core::changelog::{generate_changelog, generate_markdown, parse_commits};
use siroc_core::vcs::LogEntry;

use common::FakeVcs;

fn entry(message: &str, author: &str) -> LogEntry {
    LogEntry {
        message: message.to_string(),
        commit: "abc1234".to_string(),
        author_name: author.to_string(),
        author_email: format!("{}@example.com", author.to_lowercase()),
    }
}

#[test]
fn test_parse_conventional_commits() {
    let commits = parse_commits(&[
        entry("feat: add x", "Ann"),
        entry("fix(core): y (#12)", "Ben"),
        entry("fix: crash on start (fixes #3)", "Ann"),
        entry("merge branch main", "Ann"),
    ]);

    assert_eq!(commits.len(), 3);
    assert_eq!(commits[0].kind, "feat");
    assert_eq!(commits[0].scope, "general");
    assert_eq!(commits[0].message, "add x");
    assert_eq!(commits[1].scope, "core");
    assert_eq!(commits[1].references, vec!["#12".to_string()]);
    assert_eq!(commits[1].message, "y");
    assert_eq!(commits[2].message, "crash on start");
    assert!(commits[2].references.is_empty());
}

#[test]
fn test_markdown_sections() {
    let commits = parse_commits(&[
        entry("feat: add x", "Ann"),
        entry("fix(core): y (#12)", "Ben"),
        entry("chore(deps): bump everything", "Bot"),
        entry("docs: readme", "Cat"),
    ]);

    let markdown = generate_markdown(&commits, &["ben".to_string()]);

    let expected = "### 🐛 Bug Fixes\n\n- `core`\n  - #12 Y\n\n\n### 🚀 Features\n\n- `general`\n  - Add x\n\n\n### 💖 Thanks to\n\n- Ann";
    assert_eq!(markdown, expected);
}

#[test]
fn test_thanks_are_sorted_and_unique() {
    let commits = parse_commits(&[
        entry("fix: a", "Zed"),
        entry("fix: b", "Amy"),
        entry("fix: c", "Zed"),
    ]);

    let markdown = generate_markdown(&commits, &[]);
    assert!(markdown.ends_with("### 💖 Thanks to\n\n- Amy\n- Zed"));
}

#[tokio::test]
async fn test_changelog_from_version_control() {
    let mut vcs = FakeVcs::new("abc1234");
    vcs.entries = vec![entry("perf: faster builds", "Dev")];

    let markdown = generate_changelog(&vcs, &["dev".to_string()]).await;
    assert_eq!(markdown, "### 🔥 Performance\n\n- `general`\n  - Faster builds");
}

#[tokio::test]
async fn test_empty_changelog() {
    let vcs = FakeVcs::new("abc1234");
    assert_eq!(generate_changelog(&vcs, &[]).await, "");
}
