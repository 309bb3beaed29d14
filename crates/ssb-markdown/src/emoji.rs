//! Emoji shortcodes and the post-render decoration pass.

use std::sync::LazyLock;

use emojis::Emoji;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

static SHORTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:([a-z0-9_+-]+):").unwrap());

/// Resolves a `:name:` shortcode starting exactly at `pos` to its glyph.
/// Returns the byte length consumed and the glyph.
pub fn shortcode_at(text: &str, pos: usize) -> Option<(usize, &'static str)> {
    let caps = SHORTCODE_RE.captures(&text[pos..])?;
    let name = caps.get(1)?.as_str();
    let emoji = emojis::get_by_shortcode(name)?;
    Some((caps.get(0)?.len(), emoji.as_str()))
}

/// Looks up a grapheme, tolerating a missing or extra U+FE0F.
fn lookup(grapheme: &str) -> Option<&'static Emoji> {
    if grapheme.is_ascii() {
        return None;
    }
    emojis::get(grapheme)
        .or_else(|| emojis::get(&grapheme.replace('\u{FE0F}', "")))
        .or_else(|| emojis::get(&format!("{grapheme}\u{FE0F}")))
}

/// Name handed to the emoji callback: the primary shortcode, or the glyph
/// itself when the emoji has none.
pub fn name_of(grapheme: &str) -> Option<String> {
    let emoji = lookup(grapheme)?;
    Some(emoji.shortcode().unwrap_or(emoji.as_str()).to_owned())
}

/// Replaces every emoji in the text content of `html` with `replace(name)`.
/// Tags, and so attribute values, are copied through untouched.
pub fn decorate<F>(html: &str, replace: F) -> String
where
    F: Fn(&str) -> String,
{
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        decorate_text(&rest[..open], &replace, &mut out);
        let close = rest[open..]
            .find('>')
            .map_or(rest.len(), |i| open + i + 1);
        out.push_str(&rest[open..close]);
        rest = &rest[close..];
    }
    decorate_text(rest, &replace, &mut out);
    out
}

fn decorate_text<F>(text: &str, replace: &F, out: &mut String)
where
    F: Fn(&str) -> String,
{
    if text.is_ascii() {
        out.push_str(text);
        return;
    }
    for grapheme in text.graphemes(true) {
        match name_of(grapheme) {
            Some(name) => out.push_str(&replace(&name)),
            None => out.push_str(grapheme),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bracket(name: &str) -> String {
        format!("[{name}]")
    }

    #[test]
    fn shortcodes_resolve() {
        assert_eq!(shortcode_at("x :cake: y", 2), Some((6, "\u{1F370}")));
        assert_eq!(shortcode_at(":not_a_real_emoji:", 0), None);
        assert_eq!(shortcode_at(":cake", 0), None);
    }

    #[test]
    fn names_prefer_shortcodes() {
        assert_eq!(name_of("\u{1F370}").as_deref(), Some("cake"));
        assert_eq!(name_of("\u{2764}\u{FE0F}").as_deref(), Some("heart"));
        assert_eq!(name_of("\u{2764}").as_deref(), Some("heart"));
        assert_eq!(name_of("a"), None);
    }

    #[test]
    fn decorate_skips_markup() {
        let html = "<img alt=\"\u{1F370}\"><p>eat \u{1F370}s</p>";
        assert_eq!(decorate(html, bracket), "<img alt=\"\u{1F370}\"><p>eat [cake]s</p>");
    }

    #[test]
    fn decorate_keeps_plain_text() {
        let html = "<p>caf\u{e9} &amp; na\u{ef}ve</p>\n";
        assert_eq!(decorate(html, bracket), html);
    }
}
