//! Markup stripping for post bodies before they are paraphrased.

use regex::Regex;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.*?\]\(.*?\)").expect("valid regex"));
static EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[*_]").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

fn strip_once(text: &str) -> String {
    let text = TAG_RE.replace_all(text, "");
    let text = LINK_RE.replace_all(&text, "");
    let text = EMPHASIS_RE.replace_all(&text, "");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Removes HTML tags, Markdown links and `*`/`_` markers, then collapses
/// whitespace.
///
/// A single pass can expose new markup (`[a]*(b)` becomes a link once the
/// `*` is gone), so passes repeat until nothing changes. Every pass either
/// shortens the text or only rewrites whitespace, so the loop terminates,
/// and the result is a fixpoint: `normalize_text(normalize_text(s)) ==
/// normalize_text(s)`.
pub fn normalize_text(text: &str) -> String {
    let mut current = strip_once(text);
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}
