use std::borrow::Cow;
use std::sync::LazyLock;

use pulldown_cmark_escape::StrWrite;
use regex::Regex;

/// Hrefs carrying this marker are rendered as `<a class="bad">` with no destination.
pub const NOT_ALLOWED_AS_LINK: &str = "not-allowed-as-link";

/// Characters whose escapes survive [`decode_href`].
const URI_RESERVED: &[u8] = b";/?:@&=+$,#";

/// Percent-decodes `href` like `decodeURI`: escapes of reserved characters
/// (`%2B`, `%40`, `%2F`, ...) stay encoded. Falls back to the raw text when
/// the decoded bytes are not UTF-8.
pub fn decode_href(href: &str) -> Cow<'_, str> {
    if !href.contains('%') {
        return Cow::Borrowed(href);
    }
    let bytes = href.as_bytes();
    let mut out = String::with_capacity(href.len());
    let mut start = 0;
    let mut i = 0;
    while i + 2 < bytes.len() {
        let reserved = bytes[i] == b'%'
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
            && u8::from_str_radix(&href[i + 1..i + 3], 16)
                .is_ok_and(|b| URI_RESERVED.contains(&b));
        if reserved {
            let Ok(decoded) = urlencoding::decode(&href[start..i]) else {
                return Cow::Borrowed(href);
            };
            out.push_str(&decoded);
            out.push_str(&href[i..i + 3]);
            i += 3;
            start = i;
        } else {
            i += 1;
        }
    }
    match urlencoding::decode(&href[start..]) {
        Ok(decoded) => {
            out.push_str(&decoded);
            Cow::Owned(out)
        }
        Err(_) => Cow::Borrowed(href),
    }
}

static BAD_PROTOCOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:vbscript|javascript|file|data):").unwrap());
static GOOD_DATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^data:image/(?:gif|png|jpeg|webp);").unwrap());

/// Whether `href` may be written as a link destination. Script and file
/// URLs are refused, as are `data:` URLs other than common image types.
pub fn validate_link(href: &str) -> bool {
    let href = href.trim().to_ascii_lowercase();
    !BAD_PROTOCOL_RE.is_match(&href) || GOOD_DATA_RE.is_match(&href)
}

/// Short display label for a sigil identifier: the first eight characters
/// (a leading `%` counts as its escape `%25`) followed by `...`, then
/// percent-decoded so a message label reads `%qcdW8...`.
pub fn sigil_label(raw: &str) -> String {
    let escaped = match raw.strip_prefix('%') {
        Some(rest) => Cow::Owned(format!("%25{rest}")),
        None => Cow::Borrowed(raw),
    };
    let head: String = escaped.chars().take(8).collect();
    let label = format!("{head}...");
    decode_href(&label).into_owned()
}

/// Escapes `&`, `<`, `>` and `"` only. Inline output keeps apostrophes as typed.
pub fn escape_inline<W: StrWrite>(w: &mut W, s: &str) -> Result<(), W::Error> {
    let mut last = 0;
    for (i, c) in s.char_indices() {
        let entity = match c {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            '"' => "&quot;",
            _ => continue,
        };
        w.write_str(&s[last..i])?;
        w.write_str(entity)?;
        last = i + 1;
    }
    w.write_str(&s[last..])
}

/// Replaces every run of newlines with one space, except a run that ends
/// the text. A trailing run longer than one becomes `" \n"`.
pub fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('\n') {
        out.push_str(&rest[..start]);
        let run = rest[start..].bytes().take_while(|b| *b == b'\n').count();
        let after = &rest[start + run..];
        if after.is_empty() {
            if run > 1 {
                out.push(' ');
            }
            out.push('\n');
        } else {
            out.push(' ');
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Strips U+FE0F variation selectors.
pub fn remove_bad_bytes(text: &str) -> String {
    text.replace('\u{FE0F}', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulldown_cmark_escape::FmtWriter;

    fn inline(s: &str) -> String {
        let mut out = String::new();
        escape_inline(&mut FmtWriter(&mut out), s).unwrap();
        out
    }

    #[test]
    fn collapse_replaces_inner_runs() {
        assert_eq!(collapse_newlines("a\nb\n\n\nc"), "a b c");
        assert_eq!(collapse_newlines("a\n"), "a\n");
        assert_eq!(collapse_newlines("a\n\n"), "a \n");
        assert_eq!(collapse_newlines("\n\na"), " a");
        assert_eq!(collapse_newlines(""), "");
    }

    #[test]
    fn collapse_is_idempotent() {
        for input in ["a\n\n", "x\ny\n\n\nz\n", "\n", "\n\n\n", "plain"] {
            let once = collapse_newlines(input);
            assert_eq!(collapse_newlines(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn sigil_labels() {
        let msg = "%qcdW859vSp/bQCA8qiPsirrCrjlIUHeq80QRjhCKYvU=.sha256";
        assert_eq!(sigil_label(msg), "%qcdW8...");
        let blob = "&RRELXJAxum631eq1ikj7+qngd3f6Dvz7eA1mZNHBPQ0=.sha256";
        assert_eq!(sigil_label(blob), "&RRELXJA...");
        let feed = "@uikkwUQU4dcd/ZrHU7JstnkTgncxQB2A8PDLHV9wDAs=.ed25519";
        assert_eq!(sigil_label(feed), "@uikkwUQ...");
    }

    #[test]
    fn inline_escape_keeps_apostrophes() {
        assert_eq!(inline(r#"<a href="x">it's & done</a>"#), "&lt;a href=&quot;x&quot;&gt;it's &amp; done&lt;/a&gt;");
    }

    #[test]
    fn decode_href_falls_back_on_bad_utf8() {
        assert_eq!(decode_href("%qc"), "%qc");
        assert_eq!(decode_href("%ff%fe"), "%ff%fe");
        assert_eq!(decode_href("a%20b%ff"), "a%20b%ff");
    }

    #[test]
    fn decode_href_keeps_reserved_escapes() {
        assert_eq!(decode_href("caf%C3%A9%20bar"), "caf\u{e9} bar");
        assert_eq!(decode_href("%40paul"), "%40paul");
        let msg = "%2BdW859vSp/bQCA8qiPsirrCrjlIUHeq80QRjhCKYvU=.sha256";
        assert_eq!(decode_href(msg), msg);
        assert_eq!(decode_href("%25%2F%20x"), "%%2F x");
    }

    #[test]
    fn script_and_file_links_are_refused() {
        for href in [
            "javascript:alert(1)",
            " JavaScript:alert(1)",
            "vbscript:msgbox",
            "file:///etc/passwd",
            "data:text/html;base64,PHNjcmlwdD4=",
        ] {
            assert!(!validate_link(href), "{href}");
        }
        for href in [
            "https://example.com",
            "#intro",
            "%qcdW859vSp/bQCA8qiPsirrCrjlIUHeq80QRjhCKYvU=.sha256",
            "data:image/png;base64,iVBORw0KGgo=",
            "mailto:a@example.com",
        ] {
            assert!(validate_link(href), "{href}");
        }
    }

    #[test]
    fn strips_variation_selectors() {
        assert_eq!(remove_bad_bytes("\u{2764}\u{FE0F}!"), "\u{2764}!");
    }
}
