//! Code extraction from free-form backend responses.
//!
//! Backends wrap code in prose and markdown fences in whatever way they like.
//! Extraction isolates the code for one artifact kind and never fails: when no
//! recognizable block is present the (lightly cleaned) input is returned.

use std::sync::LazyLock;

use promptsite_core::ArtifactKind;
use regex::Regex;

static HTML_DOCUMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<html\b.*</html\s*>").expect("html pattern is valid"));

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(.*?)```").expect("fence pattern is valid"));

static FENCE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_+.#-]*$").expect("fence tag pattern is valid")
});

static STYLE_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?style\b[^>]*>").expect("style tag pattern is valid"));

static SCRIPT_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?script\b[^>]*>").expect("script tag pattern is valid")
});

/// Extracted code plus whether a clean match was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// The extracted (or fallback) text, trimmed.
    pub text: String,
    /// `false` when the fallback path produced `text`.
    pub matched: bool,
}

/// Extract the code for `kind` from `text`.
#[must_use]
pub fn extract(text: &str, kind: ArtifactKind) -> String {
    extract_with_outcome(text, kind).text
}

/// Extract the code for `kind`, reporting whether a clean match was found.
#[must_use]
pub fn extract_with_outcome(text: &str, kind: ArtifactKind) -> Extraction {
    match kind {
        ArtifactKind::Markup => match HTML_DOCUMENT.find(text) {
            Some(m) => Extraction {
                text: m.as_str().trim().to_string(),
                matched: true,
            },
            None => Extraction {
                text: text.trim().to_string(),
                matched: false,
            },
        },
        ArtifactKind::Style => fenced_or(text, kind, &STYLE_TAGS),
        ArtifactKind::Script => fenced_or(text, kind, &SCRIPT_TAGS),
    }
}

/// First suitable fenced block, or `text` with `stray` tags removed.
fn fenced_or(text: &str, kind: ArtifactKind, stray: &Regex) -> Extraction {
    if let Some(body) = select_block(text, kind) {
        return Extraction {
            text: body.to_string(),
            matched: true,
        };
    }

    Extraction {
        text: stray.replace_all(text, "").trim().to_string(),
        matched: false,
    }
}

/// Pick a non-empty fenced block: one tagged for `kind`, else an untagged one,
/// else the first block with any tag.
fn select_block(text: &str, kind: ArtifactKind) -> Option<&str> {
    let blocks: Vec<(String, &str)> = FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|interior| split_tag(interior.as_str()))
        .filter(|(_, body)| !body.is_empty())
        .collect();

    let tagged = blocks
        .iter()
        .find(|(tag, _)| kind.fence_tags().contains(&tag.as_str()));
    let untagged = || blocks.iter().find(|(tag, _)| tag.is_empty());

    tagged
        .or_else(untagged)
        .or_else(|| blocks.first())
        .map(|(_, body)| *body)
}

/// Split a fence interior into its lowercase language tag and trimmed body.
fn split_tag(interior: &str) -> (String, &str) {
    if let Some((first_line, rest)) = interior.split_once('\n') {
        let tag = first_line.trim();
        if FENCE_TAG.is_match(tag) {
            return (tag.to_ascii_lowercase(), rest.trim());
        }
    }
    (String::new(), interior.trim())
}
