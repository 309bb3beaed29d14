use std::sync::LazyLock;

use regex::Regex;

static HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#([\w+-]+)").unwrap());

/// A `#tag` found in text. `start..end` covers the `#` and the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hashtag<'t> {
    pub start: usize,
    pub end: usize,
    pub tag: &'t str,
}

impl Hashtag<'_> {
    /// Channel key handed to the resolver: `#` plus the lowercased tag.
    pub fn channel(&self) -> String {
        channel_key(self.tag)
    }
}

pub fn channel_key(tag: &str) -> String {
    format!("#{}", tag.to_lowercase())
}

/// Matches a hashtag starting exactly at `pos`. The `#` must open the text
/// or follow whitespace, and a tag made only of digits is not a hashtag.
pub fn hashtag_at(text: &str, pos: usize) -> Option<Hashtag<'_>> {
    let prev = text[..pos].chars().next_back();
    if prev.is_some_and(|c| !c.is_whitespace()) {
        return None;
    }
    let caps = HASHTAG_RE.captures(&text[pos..])?;
    let tag = caps.get(1)?.as_str();
    if tag.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(Hashtag {
        start: pos,
        end: pos + 1 + tag.len(),
        tag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_at_boundaries() {
        let tag = hashtag_at("#Feedback please", 0).unwrap();
        assert_eq!(tag.tag, "Feedback");
        assert_eq!(tag.end, 9);
        assert_eq!(tag.channel(), "#feedback");

        assert_eq!(hashtag_at("see #ssb-dev!", 4).unwrap().tag, "ssb-dev");
        assert!(hashtag_at("issue#12ab", 5).is_none());
    }

    #[test]
    fn rejects_numbers_and_empty_tags() {
        assert!(hashtag_at("#1", 0).is_none());
        assert!(hashtag_at("# heading", 0).is_none());
        assert!(hashtag_at("#/channel", 0).is_none());
    }

    #[test]
    fn unicode_tags() {
        let tag = hashtag_at("#Café", 0).unwrap();
        assert_eq!(tag.tag, "Café");
        assert_eq!(tag.channel(), "#café");
    }
}
