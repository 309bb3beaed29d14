//! Autolinking of free text: scheme URLs, bare domains, email addresses and
//! the `@` / `%` / `&` sigil identifiers.
//!
//! The scanner only ever sees text that is outside existing links, code and
//! raw HTML; the token layer takes care of that.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::RenderConfig;
use crate::refs::{RefKind, SIGIL_BODY_RE, Sigil};
use crate::utils::{sigil_label, validate_link};

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._+=/-]*[A-Za-z0-9_+=/-]").unwrap());
static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:").unwrap());
static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?\.)+([a-zA-Z]{2,})").unwrap()
});
static EMAIL_LOCAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@").unwrap());
static CC_TLD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        "^(?:a[cdefgilmnoqrstuwxz]|b[abdefghijmnorstvwyz]|c[acdfghiklmnoruvwxyz]|d[ejkmoz]",
        "|e[cegrstu]|f[ijkmor]|g[abdefghilmnpqrstuwy]|h[kmnrtu]|i[delmnoqrst]|j[emop]",
        "|k[eghimnprwyz]|l[abcikrstuvy]|m[acdeghklmnopqrstuvwxyz]|n[acefgilopruz]|om",
        "|p[aefghklmnrstwy]|qa|r[eosuw]|s[abcdeghijklmnortuvxyz]|t[cdfghjklmnortvwz]",
        "|u[agksyz]|v[aceginu]|w[fs]|y[et]|z[amw])$"
    ))
    .unwrap()
});

const GENERIC_TLDS: &[&str] = &[
    "biz", "com", "edu", "gov", "net", "org", "pro", "web", "xxx", "aero", "asia", "coop", "info",
    "museum", "name", "shop",
];

/// One autolink found in a run of text. Offsets are byte offsets into that text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub end: usize,
    /// Exactly the matched source text.
    pub raw: String,
    pub kind: RefKind,
    /// Link label.
    pub text: String,
    /// Link destination before resolution.
    pub url: String,
}

pub struct Linkifier<'c> {
    config: &'c RenderConfig,
}

impl<'c> Linkifier<'c> {
    pub fn new(config: &'c RenderConfig) -> Self {
        Self { config }
    }

    /// All non-overlapping matches, scanning left to right.
    pub fn matches(&self, text: &str) -> Vec<Match> {
        let mut found = Vec::new();
        let mut pos = 0;
        while let Some(c) = text[pos..].chars().next() {
            match self.match_at(text, pos) {
                Some(m) => {
                    pos = m.end;
                    found.push(m);
                }
                None => pos += c.len_utf8(),
            }
        }
        found
    }

    /// Tries to start a match exactly at byte offset `pos`.
    pub fn match_at(&self, text: &str, pos: usize) -> Option<Match> {
        let rest = &text[pos..];
        let first = rest.chars().next()?;
        let prev = text[..pos].chars().next_back();
        if !at_boundary(prev) {
            return None;
        }

        if let Some(sigil) = Sigil::from_char(first).filter(|s| *s != Sigil::Channel) {
            let len = self.sigil_len(sigil, &rest[1..]);
            if len == 0 {
                return None;
            }
            return Some(sigil_match(pos, sigil, &rest[..1 + len]));
        }

        if !first.is_ascii_alphanumeric() {
            return None;
        }
        let (len, url) = self
            .scheme_link(rest)
            .or_else(|| fuzzy_email(rest))
            .or_else(|| fuzzy_link(rest))?;
        let raw = &rest[..len];
        tracing::trace!(raw, url, "autolinked url");
        Some(Match {
            start: pos,
            end: pos + len,
            raw: raw.to_owned(),
            kind: RefKind::PlainUrl,
            text: raw.to_owned(),
            url,
        })
    }

    /// Length of the identifier body following `sigil`, or 0 if it is not one.
    ///
    /// `@` followed by a full identifier is always accepted. Shorter `@`
    /// mentions, and every `%` / `&` identifier, only count when the
    /// resolver recognizes them.
    pub fn sigil_len(&self, sigil: Sigil, tail: &str) -> usize {
        let c = sigil.as_char();
        if let Some(m) = SIGIL_BODY_RE.find(tail) {
            if sigil == Sigil::Feed {
                return m.end();
            }
            let candidate = format!("{c}{}", m.as_str());
            if self.config.to_url(&candidate, false).is_some() {
                return m.end();
            }
            tracing::debug!(candidate, "identifier not recognized by resolver");
            return 0;
        }
        if sigil == Sigil::Feed {
            if let Some(m) = MENTION_RE.find(tail) {
                let candidate = format!("@{}", m.as_str());
                if self.config.to_url(&candidate, false).is_some() {
                    return m.end();
                }
            }
        }
        0
    }

    fn scheme_link(&self, rest: &str) -> Option<(usize, String)> {
        let prefix = SCHEME_RE.find(rest)?;
        let scheme = &rest[..prefix.end() - 1];
        let after = &rest[prefix.end()..];

        if scheme.eq_ignore_ascii_case("mailto") {
            let len = prefix.end() + email_len(after)?;
            return Some((len, rest[..len].to_owned()));
        }
        if !self.config.accepts_scheme(scheme) || !validate_link(rest) {
            return None;
        }
        let body = after.strip_prefix("//")?;
        let body_len = link_body_len(body);
        if body_len == 0 {
            return None;
        }
        let len = prefix.end() + 2 + body_len;
        Some((len, rest[..len].to_owned()))
    }
}

fn sigil_match(start: usize, sigil: Sigil, raw: &str) -> Match {
    let identifier = SIGIL_BODY_RE
        .find(&raw[1..])
        .is_some_and(|m| m.end() == raw.len() - 1);
    let text = if identifier {
        sigil_label(raw)
    } else {
        raw.to_owned()
    };
    Match {
        start,
        end: start + raw.len(),
        raw: raw.to_owned(),
        kind: sigil.kind(),
        text,
        url: raw.to_owned(),
    }
}

/// Links may not start in the middle of a word, a path or another identifier.
fn at_boundary(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(c) => {
            !c.is_alphanumeric()
                && !matches!(c, '.' | ':' | '/' | '-' | '_' | '@' | '%' | '&' | '+' | '=')
        }
    }
}

fn tld_ok(tld: &str) -> bool {
    let tld = tld.to_ascii_lowercase();
    GENERIC_TLDS.contains(&tld.as_str()) || CC_TLD_RE.is_match(&tld)
}

/// Length of a bare domain at the start of `s`, if it ends in a known TLD.
fn domain_len(s: &str) -> Option<usize> {
    let caps = DOMAIN_RE.captures(s)?;
    let whole = caps.get(0)?;
    let tld = caps.get(1)?;
    if !tld_ok(tld.as_str()) {
        return None;
    }
    match s[whole.end()..].chars().next() {
        Some(c) if c.is_alphanumeric() || matches!(c, '-' | '_' | '@') => None,
        _ => Some(whole.end()),
    }
}

fn email_len(s: &str) -> Option<usize> {
    let local = EMAIL_LOCAL_RE.find(s)?;
    Some(local.end() + domain_len(&s[local.end()..])?)
}

fn fuzzy_email(rest: &str) -> Option<(usize, String)> {
    let len = email_len(rest)?;
    Some((len, format!("mailto:{}", &rest[..len])))
}

fn fuzzy_link(rest: &str) -> Option<(usize, String)> {
    let mut len = domain_len(rest)?;
    if rest[len..].starts_with(['/', '?', '#', ':']) {
        len += link_body_len(&rest[len..]);
    }
    Some((len, format!("http://{}", &rest[..len])))
}

/// Length of a URL body: up to whitespace or `<>"`, minus trailing
/// punctuation and unbalanced closing brackets.
fn link_body_len(body: &str) -> usize {
    let mut end = body
        .find(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '`'))
        .unwrap_or(body.len());
    while let Some(last) = body[..end].chars().next_back() {
        let candidate = &body[..end];
        let trim = match last {
            '.' | ',' | ':' | ';' | '!' | '?' | '\'' | '*' | '~' => true,
            ')' => candidate.matches('(').count() < candidate.matches(')').count(),
            ']' => candidate.matches('[').count() < candidate.matches(']').count(),
            _ => false,
        };
        if !trim {
            break;
        }
        end -= last.len_utf8();
    }
    end
}
