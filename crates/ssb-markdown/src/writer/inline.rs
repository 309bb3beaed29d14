use std::marker::PhantomData;

use pulldown_cmark::{Event, Tag, TagEnd};
use pulldown_cmark_escape::StrWrite;

use crate::tokens::Token;
use crate::utils::escape_inline;

use super::collect_alt;

/// Writes a one-line preview: links keep their text, images their alt
/// text, code its escaped contents, and only emphasis markup survives.
///
/// Block boundaries become single newlines, which the caller collapses.
pub struct InlineWriter<'a, I, W> {
    tokens: I,
    writer: W,
    /// A block ended; separate it from whatever is written next.
    pending_break: bool,
    wrote_any: bool,
    _phantom: PhantomData<&'a ()>,
}

impl<'a, I, W> InlineWriter<'a, I, W>
where
    I: Iterator<Item = Token<'a>>,
    W: StrWrite,
{
    pub fn new(tokens: I, writer: W) -> Self {
        Self {
            tokens,
            writer,
            pending_break: false,
            wrote_any: false,
            _phantom: PhantomData,
        }
    }

    fn flush_break(&mut self) -> Result<(), W::Error> {
        if self.pending_break && self.wrote_any {
            self.writer.write_str("\n")?;
        }
        self.pending_break = false;
        self.wrote_any = true;
        Ok(())
    }

    fn write(&mut self, s: &str) -> Result<(), W::Error> {
        if s.is_empty() {
            return Ok(());
        }
        self.flush_break()?;
        self.writer.write_str(s)
    }

    fn write_text(&mut self, s: &str) -> Result<(), W::Error> {
        if s.is_empty() {
            return Ok(());
        }
        self.flush_break()?;
        escape_inline(&mut self.writer, s)
    }

    pub fn run(mut self) -> Result<W, W::Error> {
        while let Some(token) = self.tokens.next() {
            match token {
                Token::Md(event) => self.process_event(event)?,
                Token::Hashtag(tag) => {
                    self.write("#")?;
                    self.write_text(&tag)?;
                }
            }
        }
        Ok(self.writer)
    }

    fn process_event(&mut self, event: Event<'a>) -> Result<(), W::Error> {
        use Event::*;
        match event {
            Start(tag) => self.start_tag(tag),
            End(tag) => self.end_tag(tag),
            Text(text) | Code(text) | Html(text) | InlineHtml(text) => self.write_text(&text),
            InlineMath(text) => {
                self.write("$")?;
                self.write_text(&text)?;
                self.write("$")
            }
            DisplayMath(text) => {
                self.write("$$")?;
                self.write_text(&text)?;
                self.write("$$")
            }
            SoftBreak | HardBreak => self.write("\n"),
            Rule => {
                self.pending_break = true;
                Ok(())
            }
            FootnoteReference(name) => {
                self.write("[^")?;
                self.write_text(&name)?;
                self.write("]")
            }
            TaskListMarker(true) => self.write("[x] "),
            TaskListMarker(false) => self.write("[ ] "),
        }
    }

    fn start_tag(&mut self, tag: Tag<'a>) -> Result<(), W::Error> {
        match tag {
            Tag::Emphasis => self.write("<em>"),
            Tag::Strong => self.write("<strong>"),
            Tag::Strikethrough => self.write("<s>"),
            Tag::Image { .. } => {
                let alt = collect_alt(&mut self.tokens);
                self.write_text(&alt)
            }
            _ => Ok(()),
        }
    }

    fn end_tag(&mut self, tag: TagEnd) -> Result<(), W::Error> {
        match tag {
            TagEnd::Emphasis => self.write("</em>"),
            TagEnd::Strong => self.write("</strong>"),
            TagEnd::Strikethrough => self.write("</s>"),
            TagEnd::Link | TagEnd::Image => Ok(()),
            _ => {
                self.pending_break = true;
                Ok(())
            }
        }
    }
}
