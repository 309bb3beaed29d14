//! Markdown rendering for Secure Scuttlebutt messages.
//!
//! Message bodies are CommonMark with a few additions: `@feed`, `%message`
//! and `&blob` identifiers in free text become links, `#channel` hashtags
//! link to their channel, and `:shortcode:` emoji are expanded. Every
//! destination goes through a caller-supplied resolver (see
//! [`RenderConfig::with_to_url`]), so the same text can render for a web
//! client, a desktop app or a static archive.
//!
//! ```
//! use ssb_markdown::{RenderConfig, render_block};
//!
//! let config = RenderConfig::new()
//!     .with_to_url(|reference, _is_image| {
//!         reference.starts_with('%').then(|| format!("/thread/{reference}"))
//!     });
//! let html = render_block("**hi** #ssb", &config);
//! assert_eq!(html, "<p><strong>hi</strong> #ssb</p>\n");
//! ```

use pulldown_cmark::{Parser, TextMergeStream};
use pulldown_cmark_escape::FmtWriter;

pub mod code_pretty;
pub mod config;
pub mod emoji;
pub mod error;
pub mod hashtag;
pub mod linkify;
pub mod refs;
pub mod tokens;
pub mod utils;
pub mod writer;

pub use config::{LinkPolicy, RenderConfig, RenderOptions};
pub use error::{ReferenceError, RenderError};
pub use linkify::{Linkifier, Match};
pub use refs::{RefKind, Reference, Sigil};

use tokens::TokenStream;
use writer::{BlockWriter, InlineWriter};

/// Renders `text` to block HTML.
///
/// Rendering never fails: if writing stops early the partial HTML is
/// returned and the error is logged.
#[tracing::instrument(skip_all, fields(len = text.len()))]
pub fn render_block(text: &str, config: &RenderConfig) -> String {
    let mut html = String::with_capacity(text.len() + text.len() / 2);
    if let Err(err) = write_block(text, config, &mut html) {
        tracing::warn!(error = %err, "block render stopped early");
    }
    finish(&html, config)
}

/// Renders `text` to a single line of inline HTML for previews and titles.
///
/// Links and images are flattened to their text, and newline runs collapse
/// to one space except at the very end.
#[tracing::instrument(skip_all, fields(len = text.len()))]
pub fn render_inline(text: &str, config: &RenderConfig) -> String {
    let mut html = String::with_capacity(text.len());
    if let Err(err) = write_inline(text, config, &mut html) {
        tracing::warn!(error = %err, "inline render stopped early");
    }
    finish(&utils::collapse_newlines(&html), config)
}

/// Block rendering without the emoji pass, appending to `out`.
pub fn write_block(text: &str, config: &RenderConfig, out: &mut String) -> Result<(), RenderError> {
    let options = config.options;
    let events = TextMergeStream::new(Parser::new_ext(text, options.parser_options()));
    let tokens = TokenStream::new(events, config, options);
    BlockWriter::new(tokens, FmtWriter(&mut *out), config).run()?;
    Ok(())
}

/// Inline rendering without newline collapsing or the emoji pass.
pub fn write_inline(
    text: &str,
    config: &RenderConfig,
    out: &mut String,
) -> Result<(), RenderError> {
    let options = config
        .options
        .difference(RenderOptions::LINKIFY | RenderOptions::HASHTAGS);
    let events = TextMergeStream::new(Parser::new_ext(text, options.parser_options()));
    let tokens = TokenStream::new(events, config, options);
    InlineWriter::new(tokens, FmtWriter(&mut *out)).run()?;
    Ok(())
}

fn finish(html: &str, config: &RenderConfig) -> String {
    if config.has_emoji() {
        let decorated = emoji::decorate(html, |name| config.emoji(name).unwrap_or_default());
        utils::remove_bad_bytes(&decorated)
    } else {
        utils::remove_bad_bytes(html)
    }
}
