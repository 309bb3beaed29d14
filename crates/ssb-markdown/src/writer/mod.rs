//! HTML writers over the [`Token`] stream.
//!
//! [`BlockWriter`] produces full block HTML; [`InlineWriter`] produces a
//! single line of text with only emphasis markup kept.

use pulldown_cmark::Event;

use crate::tokens::Token;

mod block;
mod inline;

pub use block::BlockWriter;
pub use inline::InlineWriter;

/// Consumes tokens up to and including the end of the current image and
/// returns its plain alt text.
fn collect_alt<'a, I>(tokens: &mut I) -> String
where
    I: Iterator<Item = Token<'a>>,
{
    let mut alt = String::new();
    let mut nest = 0;
    for token in tokens.by_ref() {
        match token {
            Token::Md(Event::Start(_)) => nest += 1,
            Token::Md(Event::End(_)) => {
                if nest == 0 {
                    break;
                }
                nest -= 1;
            }
            Token::Md(
                Event::Text(text)
                | Event::Code(text)
                | Event::InlineHtml(text)
                | Event::InlineMath(text),
            ) => alt.push_str(&text),
            Token::Md(Event::SoftBreak | Event::HardBreak) => alt.push(' '),
            Token::Hashtag(tag) => {
                alt.push('#');
                alt.push_str(&tag);
            }
            Token::Md(_) => {}
        }
    }
    alt
}
