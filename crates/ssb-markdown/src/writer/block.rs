use std::borrow::Cow;
use std::marker::PhantomData;

use pulldown_cmark::{Alignment, CodeBlockKind, CowStr, Event, LinkType, Tag, TagEnd};
use pulldown_cmark_escape::{StrWrite, escape_href, escape_html};

use crate::code_pretty;
use crate::config::{RenderConfig, RenderOptions};
use crate::hashtag::channel_key;
use crate::refs;
use crate::tokens::Token;
use crate::utils::{NOT_ALLOWED_AS_LINK, decode_href, validate_link};

use super::collect_alt;

#[derive(Debug, Clone, Copy)]
enum TableState {
    Head,
    Body,
}

/// Writes block HTML for a message body.
///
/// Links are resolved through the config's `to_url`, images are restricted
/// to blob sources, raw HTML is escaped, and fenced code is highlighted when
/// the language is known.
pub struct BlockWriter<'a, 'c, I, W> {
    tokens: I,
    writer: W,
    config: &'c RenderConfig,

    /// Whether or not the last write wrote a newline.
    end_newline: bool,
    in_non_writing_block: bool,

    table_state: TableState,
    table_alignments: Vec<Alignment>,
    table_cell_index: usize,
    table_body_open: bool,

    code_buffer: Option<(Option<String>, String)>, // (lang, content)
    html_buffer: Option<String>,
    /// Per open link: `None` for a written `<a>`, or the source text that
    /// closes a refused one.
    link_closers: Vec<Option<String>>,
    _phantom: PhantomData<&'a ()>,
}

impl<'a, 'c, I, W> BlockWriter<'a, 'c, I, W>
where
    I: Iterator<Item = Token<'a>>,
    W: StrWrite,
{
    pub fn new(tokens: I, writer: W, config: &'c RenderConfig) -> Self {
        Self {
            tokens,
            writer,
            config,
            end_newline: true,
            in_non_writing_block: false,
            table_state: TableState::Head,
            table_alignments: vec![],
            table_cell_index: 0,
            table_body_open: false,
            code_buffer: None,
            html_buffer: None,
            link_closers: Vec::new(),
            _phantom: PhantomData,
        }
    }

    #[inline]
    fn write_newline(&mut self) -> Result<(), W::Error> {
        self.end_newline = true;
        self.writer.write_str("\n")
    }

    /// Writes a buffer, and tracks whether or not a newline was written.
    #[inline]
    fn write(&mut self, s: &str) -> Result<(), W::Error> {
        self.writer.write_str(s)?;
        if !s.is_empty() {
            self.end_newline = s.ends_with('\n');
        }
        Ok(())
    }

    /// Opens a block-level tag on a fresh line.
    fn write_block_open(&mut self, s: &str) -> Result<(), W::Error> {
        if !self.end_newline {
            self.write_newline()?;
        }
        self.write(s)
    }

    /// Escaped text outside any buffer.
    fn write_text(&mut self, s: &str) -> Result<(), W::Error> {
        escape_html(&mut self.writer, s)?;
        if !s.is_empty() {
            self.end_newline = false;
        }
        Ok(())
    }

    pub fn run(mut self) -> Result<W, W::Error> {
        while let Some(token) = self.tokens.next() {
            match token {
                Token::Md(event) => self.process_event(event)?,
                Token::Hashtag(tag) => self.write_hashtag(&tag)?,
            }
        }
        Ok(self.writer)
    }

    fn process_event(&mut self, event: Event<'a>) -> Result<(), W::Error> {
        use Event::*;
        match event {
            Start(tag) => self.start_tag(tag)?,
            End(tag) => self.end_tag(tag)?,
            Text(text) => {
                if let Some((_, ref mut buffer)) = self.code_buffer {
                    buffer.push_str(&text);
                } else if !self.in_non_writing_block {
                    escape_html(&mut self.writer, &text)?;
                    self.end_newline = text.ends_with('\n');
                }
            }
            Code(text) => {
                self.write("<code>")?;
                escape_html(&mut self.writer, &text)?;
                self.write("</code>")?;
            }
            InlineMath(text) => {
                self.write("$")?;
                escape_html(&mut self.writer, &text)?;
                self.write("$")?;
            }
            DisplayMath(text) => {
                self.write("$$")?;
                escape_html(&mut self.writer, &text)?;
                self.write("$$")?;
            }
            Html(html) | InlineHtml(html) => {
                if let Some(buffer) = self.html_buffer.as_mut() {
                    buffer.push_str(&html);
                } else {
                    escape_html(&mut self.writer, &html)?;
                    self.end_newline = false;
                }
            }
            SoftBreak => {
                if self.config.options.contains(RenderOptions::HARD_BREAKS) {
                    self.write("<br>\n")?;
                } else {
                    self.write_newline()?;
                }
            }
            HardBreak => self.write("<br>\n")?,
            Rule => self.write_block_open("<hr>\n")?,
            FootnoteReference(name) => {
                self.write("[^")?;
                escape_html(&mut self.writer, &name)?;
                self.write("]")?;
            }
            TaskListMarker(true) => self.write("[x] ")?,
            TaskListMarker(false) => self.write("[ ] ")?,
        }
        Ok(())
    }

    fn start_tag(&mut self, tag: Tag<'a>) -> Result<(), W::Error> {
        match tag {
            Tag::Paragraph => self.write_block_open("<p>"),
            Tag::Heading { level, .. } => {
                self.write_block_open("<")?;
                write!(&mut self.writer, "{}", level)?;
                self.write(">")
            }
            // markup is never passed through; the block becomes a paragraph of text
            Tag::HtmlBlock => {
                self.html_buffer = Some(String::new());
                self.write_block_open("<p>")
            }
            Tag::Table(alignments) => {
                self.table_alignments = alignments;
                self.table_body_open = false;
                self.write_block_open("<table>\n")
            }
            Tag::TableHead => {
                self.table_state = TableState::Head;
                self.table_cell_index = 0;
                self.write("<thead>\n<tr>\n")
            }
            Tag::TableRow => {
                self.table_cell_index = 0;
                if !self.table_body_open {
                    self.table_body_open = true;
                    self.write("<tbody>\n")?;
                }
                self.write("<tr>\n")
            }
            Tag::TableCell => {
                match self.table_state {
                    TableState::Head => self.write("<th")?,
                    TableState::Body => self.write("<td")?,
                }
                match self.table_alignments.get(self.table_cell_index) {
                    Some(&Alignment::Left) => self.write(" style=\"text-align:left\">"),
                    Some(&Alignment::Center) => self.write(" style=\"text-align:center\">"),
                    Some(&Alignment::Right) => self.write(" style=\"text-align:right\">"),
                    _ => self.write(">"),
                }
            }
            Tag::BlockQuote(_) => self.write_block_open("<blockquote>\n"),
            Tag::CodeBlock(info) => {
                let lang = match info {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().map(str::to_owned)
                    }
                    CodeBlockKind::Indented => None,
                };
                self.code_buffer = Some((lang, String::new()));
                Ok(())
            }
            Tag::List(Some(1)) => self.write_block_open("<ol>\n"),
            Tag::List(Some(start)) => {
                self.write_block_open("<ol start=\"")?;
                write!(&mut self.writer, "{}", start)?;
                self.write("\">\n")
            }
            Tag::List(None) => self.write_block_open("<ul>\n"),
            Tag::Item => self.write_block_open("<li>"),
            Tag::Emphasis => self.write("<em>"),
            Tag::Strong => self.write("<strong>"),
            Tag::Strikethrough => self.write("<s>"),
            Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            } => {
                if validate_link(&dest_url) {
                    self.link_closers.push(None);
                    self.write_link_open(link_type, &dest_url, &title)
                } else {
                    tracing::debug!(dest_url = %dest_url, "refusing link destination");
                    let (open, close) = literal_link(link_type, &dest_url, &title, &id);
                    self.link_closers.push(Some(close));
                    self.write_text(&open)
                }
            }
            Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            } => {
                let alt = collect_alt(&mut self.tokens);
                if validate_link(&dest_url) {
                    self.write_media(&dest_url, &title, &alt)
                } else {
                    tracing::debug!(dest_url = %dest_url, "refusing image destination");
                    let (open, close) = literal_link(link_type, &dest_url, &title, &id);
                    self.write_text(&format!("!{open}{alt}{close}"))
                }
            }
            Tag::MetadataBlock(_) => {
                self.in_non_writing_block = true;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn end_tag(&mut self, tag: TagEnd) -> Result<(), W::Error> {
        match tag {
            TagEnd::Paragraph => self.write("</p>\n"),
            TagEnd::Heading(level) => {
                self.write("</")?;
                write!(&mut self.writer, "{}", level)?;
                self.write(">\n")
            }
            TagEnd::HtmlBlock => {
                if let Some(html) = self.html_buffer.take() {
                    escape_html(&mut self.writer, html.trim_end())?;
                }
                self.write("</p>\n")
            }
            TagEnd::Table => {
                if self.table_body_open {
                    self.write("</tbody>\n")?;
                }
                self.table_body_open = false;
                self.write("</table>\n")
            }
            TagEnd::TableHead => {
                self.table_state = TableState::Body;
                self.write("</tr>\n</thead>\n")
            }
            TagEnd::TableRow => self.write("</tr>\n"),
            TagEnd::TableCell => {
                self.table_cell_index += 1;
                match self.table_state {
                    TableState::Head => self.write("</th>\n"),
                    TableState::Body => self.write("</td>\n"),
                }
            }
            TagEnd::BlockQuote(_) => self.write_block_open("</blockquote>\n"),
            TagEnd::CodeBlock => self.write_code_block(),
            TagEnd::List(true) => self.write_block_open("</ol>\n"),
            TagEnd::List(false) => self.write_block_open("</ul>\n"),
            TagEnd::Item => self.write("</li>\n"),
            TagEnd::Emphasis => self.write("</em>"),
            TagEnd::Strong => self.write("</strong>"),
            TagEnd::Strikethrough => self.write("</s>"),
            TagEnd::Link => match self.link_closers.pop().flatten() {
                Some(close) => self.write_text(&close),
                None => self.write("</a>"),
            },
            // collect_alt() already consumed the End(Image) event
            TagEnd::Image => Ok(()),
            TagEnd::MetadataBlock(_) => {
                self.in_non_writing_block = false;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn write_code_block(&mut self) -> Result<(), W::Error> {
        let Some((lang, code)) = self.code_buffer.take() else {
            return Ok(());
        };
        let mut block = String::new();
        if let Some(lang) = lang.as_deref() {
            if let Err(err) = code_pretty::highlight_block(lang, &code, &mut block) {
                tracing::debug!(error = %err, "highlighting skipped");
                block.clear();
            }
        }
        if block.is_empty() {
            if let Err(err) = code_pretty::write_plain(lang.as_deref(), &code, &mut block) {
                tracing::warn!(error = %err, "failed to format code block");
            }
        }
        self.write_block_open(&block)
    }

    /// Opening `<a>` for both written links and autolinks.
    ///
    /// A destination the resolver recognizes is replaced by its result and
    /// left undecorated. Anything else keeps its original href and gets the
    /// configured [`LinkPolicy`](crate::LinkPolicy) attributes.
    fn write_link_open(
        &mut self,
        link_type: LinkType,
        dest_url: &str,
        title: &str,
    ) -> Result<(), W::Error> {
        if dest_url.contains(NOT_ALLOWED_AS_LINK) {
            tracing::debug!(dest_url, "link marked as not allowed");
            self.write("<a class=\"bad\"")?;
            self.write_attr_html("title", title)?;
            return self.write(">");
        }

        let dest_url = match link_type {
            LinkType::Email => Cow::Owned(format!("mailto:{dest_url}")),
            _ => Cow::Borrowed(dest_url),
        };
        // autolinked identifiers were checked against the resolver undecoded
        let decoded = decode_href(&dest_url);
        let resolved = self.config.to_url(&decoded, false).or_else(|| {
            (decoded != dest_url)
                .then(|| self.config.to_url(&dest_url, false))
                .flatten()
        });
        let href = resolved.as_deref().unwrap_or(&dest_url);
        self.write("<a")?;
        self.write_attr_href("href", href)?;
        self.write_attr_html("title", title)?;
        let policy = self.config.link_policy;
        if resolved.is_none() && policy.applies_to(&dest_url) {
            if policy.new_tab {
                self.write(" target=\"_blank\"")?;
            }
            if policy.noopener {
                self.write(" rel=\"noopener\"")?;
            }
        }
        self.write(">")
    }

    /// Images only load from blobs. `audio:` / `video:` alt prefixes select
    /// a player element instead of a linked `<img>`.
    fn write_media(&mut self, dest_url: &str, title: &str, alt: &str) -> Result<(), W::Error> {
        let src = if refs::is_blob(dest_url) {
            self.config.to_url(dest_url, true).unwrap_or_default()
        } else {
            tracing::debug!(dest_url, "image source is not a blob, dropping it");
            String::new()
        };

        let close = if alt.starts_with("audio:") {
            self.write("<audio controls")?;
            "/>"
        } else if alt.starts_with("video:") {
            self.write("<video controls")?;
            "/>"
        } else {
            let link = self.config.image_link(dest_url);
            self.write("<a")?;
            self.write_attr_href("href", &link)?;
            self.write("><img")?;
            "></a>"
        };
        self.write_attr_href("src", &src)?;
        self.write_attr_html("alt", alt)?;
        self.write_attr_html("title", title)?;
        self.write(close)
    }

    fn write_hashtag(&mut self, tag: &CowStr<'a>) -> Result<(), W::Error> {
        match self.config.to_url(&channel_key(tag), false) {
            Some(url) => {
                self.write("<a")?;
                self.write_attr_href("href", &url)?;
                self.write(">#")?;
                escape_html(&mut self.writer, tag)?;
                self.write("</a>")
            }
            None => {
                self.write("#")?;
                escape_html(&mut self.writer, tag)
            }
        }
    }

    /// Empty values are omitted entirely.
    fn write_attr_href(&mut self, name: &str, value: &str) -> Result<(), W::Error> {
        if value.is_empty() {
            return Ok(());
        }
        write!(&mut self.writer, " {}=\"", name)?;
        escape_href(&mut self.writer, value)?;
        self.write("\"")
    }

    fn write_attr_html(&mut self, name: &str, value: &str) -> Result<(), W::Error> {
        if value.is_empty() {
            return Ok(());
        }
        write!(&mut self.writer, " {}=\"", name)?;
        escape_html(&mut self.writer, value)?;
        self.write("\"")
    }
}

/// Source-like text around a link whose destination was refused, as
/// `(before content, after content)`.
fn literal_link(link_type: LinkType, dest_url: &str, title: &str, id: &str) -> (String, String) {
    match link_type {
        LinkType::Autolink | LinkType::Email => ("<".into(), ">".into()),
        LinkType::Reference | LinkType::ReferenceUnknown => ("[".into(), format!("][{id}]")),
        LinkType::Collapsed | LinkType::CollapsedUnknown => ("[".into(), "][]".into()),
        LinkType::Shortcut | LinkType::ShortcutUnknown => ("[".into(), "]".into()),
        _ if title.is_empty() => ("[".into(), format!("]({dest_url})")),
        _ => ("[".into(), format!("]({dest_url} \"{title}\")")),
    }
}
