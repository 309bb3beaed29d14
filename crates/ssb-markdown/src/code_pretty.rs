//! Fenced code block highlighting.
//!
//! Blocks are tokenized with syntect's bundled syntaxes and emitted as
//! `<span class="...">` runs; styling is left to the embedding page's CSS.

use pulldown_cmark_escape::{FmtWriter, escape_html};

use crate::error::RenderError;

#[cfg(feature = "syntax-highlighting")]
use std::sync::LazyLock;
#[cfg(feature = "syntax-highlighting")]
use syntect::{
    html::{ClassStyle, ClassedHTMLGenerator},
    parsing::SyntaxSet,
    util::LinesWithEndings,
};

#[cfg(feature = "syntax-highlighting")]
pub static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);

/// Writes a complete `<pre><code>` block for `code` into `output`.
///
/// On error nothing has been written and the caller should fall back to
/// [`write_plain`].
#[cfg(feature = "syntax-highlighting")]
pub fn highlight(
    syntax_set: &SyntaxSet,
    lang: &str,
    code: &str,
    output: &mut String,
) -> Result<(), RenderError> {
    let syntax = syntax_set
        .find_syntax_by_token(lang)
        .ok_or_else(|| RenderError::UnknownLanguage(lang.to_owned()))?;
    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set, ClassStyle::Spaced);
    for line in LinesWithEndings::from(code) {
        generator.parse_html_for_line_which_includes_newline(line)?;
    }
    let body = generator.finalize();

    open_block(output, Some(lang))?;
    output.push_str(&body);
    output.push_str("</code></pre>\n");
    Ok(())
}

#[cfg(not(feature = "syntax-highlighting"))]
pub fn highlight(_lang: &str, _code: &str, _output: &mut String) -> Result<(), RenderError> {
    Err(RenderError::HighlightingDisabled)
}

/// Highlights with the bundled syntax set.
pub fn highlight_block(lang: &str, code: &str, output: &mut String) -> Result<(), RenderError> {
    #[cfg(feature = "syntax-highlighting")]
    {
        highlight(&SYNTAX_SET, lang, code, output)
    }
    #[cfg(not(feature = "syntax-highlighting"))]
    {
        highlight(lang, code, output)
    }
}

/// Escaped, unhighlighted block.
pub fn write_plain(lang: Option<&str>, code: &str, output: &mut String) -> Result<(), RenderError> {
    open_block(output, lang)?;
    escape_html(&mut FmtWriter(&mut *output), code)?;
    output.push_str("</code></pre>\n");
    Ok(())
}

fn open_block(output: &mut String, lang: Option<&str>) -> Result<(), RenderError> {
    match lang {
        Some(lang) if !lang.is_empty() => {
            output.push_str("<pre><code class=\"language-");
            escape_html(&mut FmtWriter(&mut *output), lang)?;
            output.push_str("\">");
        }
        _ => output.push_str("<pre><code>"),
    }
    Ok(())
}
