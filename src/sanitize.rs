//! Markdown marker stripping for streamed fragments.
//!
//! Every fragment is cleaned on its own. A construct whose delimiters land in
//! two different fragments is left as it arrived.

use std::sync::LazyLock;

use regex::Regex;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid fenced block pattern"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid inline code pattern"));
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid bold pattern"));
static ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*]+)\*").expect("valid italic pattern"));
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|[ \t])#+[ \t]").expect("valid heading pattern"));
static LIST_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[-*][ \t]").expect("valid list bullet pattern"));

pub fn sanitize(fragment: &str) -> String {
    let text = FENCED_BLOCK.replace_all(fragment, "");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = HEADING.replace_all(&text, "$1");
    let text = LIST_BULLET.replace_all(&text, "");
    text.trim().to_owned()
}

/// Cleans one upstream delta for the client. Returns `None` when nothing is
/// left to write. The delta's own leading and trailing whitespace is kept
/// around the cleaned text so spacing between consecutive tokens survives.
pub fn clean_delta(delta: &str) -> Option<String> {
    let cleaned = sanitize(delta);
    if cleaned.is_empty() {
        return None;
    }

    let body_start = delta.len() - delta.trim_start().len();
    let body_end = delta.trim_end().len();
    let leading = &delta[..body_start];
    let trailing = &delta[body_end.max(body_start)..];

    Some(format!("{leading}{cleaned}{trailing}"))
}
