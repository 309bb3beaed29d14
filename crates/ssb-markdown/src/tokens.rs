//! Adapter between the CommonMark event stream and the HTML writers.
//!
//! Plain text runs are rescanned for autolinks, hashtags and emoji
//! shortcodes. Autolinks come out as ordinary `Link` events so the writer
//! applies one link rule to both written and detected links.

use std::collections::VecDeque;
use std::ops::Range;

use pulldown_cmark::{CowStr, Event, LinkType, Tag, TagEnd};

use crate::config::{RenderConfig, RenderOptions};
use crate::emoji;
use crate::hashtag;
use crate::linkify::{Linkifier, Match};

#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    Md(Event<'a>),
    /// A `#tag` outside links and code. Holds the tag without the `#`.
    Hashtag(CowStr<'a>),
}

enum Segment {
    Text(Range<usize>),
    Link(Match),
    Hashtag(Range<usize>),
    Glyph(&'static str),
}

pub struct TokenStream<'a, 'c, I> {
    iter: I,
    config: &'c RenderConfig,
    options: RenderOptions,
    pending: VecDeque<Token<'a>>,
    /// Nesting of links and images; their text is left alone.
    opaque_depth: usize,
    in_code_block: bool,
    in_metadata: bool,
}

impl<'a, 'c, I> TokenStream<'a, 'c, I>
where
    I: Iterator<Item = Event<'a>>,
{
    /// `options` selects which rewrites run; it is usually `config.options`
    /// narrowed for the render mode.
    pub fn new(iter: I, config: &'c RenderConfig, options: RenderOptions) -> Self {
        Self {
            iter,
            config,
            options,
            pending: VecDeque::new(),
            opaque_depth: 0,
            in_code_block: false,
            in_metadata: false,
        }
    }

    fn track(&mut self, event: &Event<'a>) {
        match event {
            Event::Start(Tag::Link { .. } | Tag::Image { .. }) => self.opaque_depth += 1,
            Event::End(TagEnd::Link | TagEnd::Image) => {
                self.opaque_depth = self.opaque_depth.saturating_sub(1)
            }
            Event::Start(Tag::CodeBlock(_)) => self.in_code_block = true,
            Event::End(TagEnd::CodeBlock) => self.in_code_block = false,
            Event::Start(Tag::MetadataBlock(_)) => self.in_metadata = true,
            Event::End(TagEnd::MetadataBlock(_)) => self.in_metadata = false,
            _ => {}
        }
    }

    fn rewrites_text(&self) -> bool {
        self.opaque_depth == 0 && !self.in_code_block && !self.in_metadata
    }

    fn scan_text(&self, text: &str) -> Vec<Segment> {
        let linkify = self.options.contains(RenderOptions::LINKIFY);
        let hashtags = self.options.contains(RenderOptions::HASHTAGS);
        let shortcodes = self.options.contains(RenderOptions::EMOJI_SHORTCODES);
        let linkifier = Linkifier::new(self.config);

        let mut segments = Vec::new();
        let mut plain_start = 0;
        let mut pos = 0;
        while let Some(c) = text[pos..].chars().next() {
            let found = match c {
                '#' if hashtags => hashtag::hashtag_at(text, pos)
                    .map(|tag| (tag.end, Segment::Hashtag(tag.start + 1..tag.end))),
                ':' if shortcodes => emoji::shortcode_at(text, pos)
                    .map(|(len, glyph)| (pos + len, Segment::Glyph(glyph))),
                _ if linkify => linkifier
                    .match_at(text, pos)
                    .map(|m| (m.end, Segment::Link(m))),
                _ => None,
            };
            match found {
                Some((end, segment)) => {
                    if plain_start < pos {
                        segments.push(Segment::Text(plain_start..pos));
                    }
                    segments.push(segment);
                    pos = end;
                    plain_start = end;
                }
                None => pos += c.len_utf8(),
            }
        }
        if plain_start < text.len() {
            segments.push(Segment::Text(plain_start..text.len()));
        }
        segments
    }

    fn expand(&mut self, text: CowStr<'a>) {
        let segments = self.scan_text(&text);
        if let [Segment::Text(_)] | [] = segments.as_slice() {
            self.pending.push_back(Token::Md(Event::Text(text)));
            return;
        }
        for segment in segments {
            match segment {
                Segment::Text(range) => self
                    .pending
                    .push_back(Token::Md(Event::Text(slice(&text, range)))),
                Segment::Hashtag(range) => {
                    self.pending.push_back(Token::Hashtag(slice(&text, range)))
                }
                Segment::Glyph(glyph) => self
                    .pending
                    .push_back(Token::Md(Event::Text(CowStr::Borrowed(glyph)))),
                Segment::Link(m) => {
                    tracing::trace!(raw = %m.raw, kind = %m.kind, "autolink");
                    self.pending.push_back(Token::Md(Event::Start(Tag::Link {
                        link_type: LinkType::Autolink,
                        dest_url: m.url.into(),
                        title: CowStr::Borrowed(""),
                        id: CowStr::Borrowed(""),
                    })));
                    self.pending
                        .push_back(Token::Md(Event::Text(m.text.into())));
                    self.pending.push_back(Token::Md(Event::End(TagEnd::Link)));
                }
            }
        }
    }
}

fn slice<'a>(text: &CowStr<'a>, range: Range<usize>) -> CowStr<'a> {
    match text {
        CowStr::Borrowed(s) => {
            let s: &'a str = s;
            CowStr::Borrowed(&s[range])
        }
        other => CowStr::from(other[range].to_owned()),
    }
}

impl<'a, I> Iterator for TokenStream<'a, '_, I>
where
    I: Iterator<Item = Event<'a>>,
{
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(token) = self.pending.pop_front() {
            return Some(token);
        }
        let event = self.iter.next()?;
        self.track(&event);
        match event {
            Event::Text(text) if self.rewrites_text() => {
                self.expand(text);
                self.pending.pop_front()
            }
            other => Some(Token::Md(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulldown_cmark::{Parser, TextMergeStream};

    const MSG: &str = "%qcdW859vSp/bQCA8qiPsirrCrjlIUHeq80QRjhCKYvU=.sha256";

    fn tokens(input: &str) -> Vec<Token<'_>> {
        let config = RenderConfig::default();
        let options = config.options;
        let events = TextMergeStream::new(Parser::new_ext(input, options.parser_options()));
        TokenStream::new(events, &config, options).collect()
    }

    fn text(s: &str) -> Token<'_> {
        Token::Md(Event::Text(CowStr::Borrowed(s)))
    }

    #[test]
    fn plain_text_passes_through() {
        let out = tokens("just words");
        assert_eq!(out[1], text("just words"));
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn autolinks_become_link_events() {
        let input = format!("see {MSG}");
        let out = tokens(&input);
        assert_eq!(out[1], text("see "));
        assert!(matches!(
            &out[2],
            Token::Md(Event::Start(Tag::Link { dest_url, .. })) if dest_url.as_ref() == MSG
        ));
        assert_eq!(out[3], Token::Md(Event::Text("%qcdW8...".into())));
        assert_eq!(out[4], Token::Md(Event::End(TagEnd::Link)));
    }

    #[test]
    fn hashtags_and_shortcodes() {
        let out = tokens("#ssb is :cake:");
        assert_eq!(out[1], Token::Hashtag(CowStr::Borrowed("ssb")));
        assert_eq!(out[2], text(" is "));
        assert_eq!(out[3], text("\u{1F370}"));
    }

    #[test]
    fn link_and_code_text_is_untouched() {
        let out = tokens("[#tag :cake:](http://example.com) `#x http://example.com`");
        assert!(out.contains(&text("#tag :cake:")));
        assert!(out.contains(&Token::Md(Event::Code("#x http://example.com".into()))));
        assert!(!out.iter().any(|t| matches!(t, Token::Hashtag(_))));

        let out = tokens("```\n#tag http://example.com\n```");
        assert!(out.contains(&text("#tag http://example.com\n")));
    }
}
