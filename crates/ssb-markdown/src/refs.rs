//! Classification of the identifiers that appear in message text.
//!
//! Feeds, messages and blobs are all written as a sigil followed by a
//! base64 hash and an algorithm tag, e.g. `%qcdW859v...=.sha256`. Channels
//! are `#` followed by a tag name. Anything with a URI scheme is treated as
//! a plain URL, and the rest is [`RefKind::Unknown`].

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ReferenceError;

/// Body accepted after a `@`, `%` or `&` sigil while scanning free text.
///
/// This is looser than the classifiers below (padding may sit anywhere in
/// the 44 characters); whether the match becomes a link is up to the
/// resolver.
pub static SIGIL_BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9+/=]{44}\.[a-z0-9]+").unwrap());

static FEED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@[A-Za-z0-9+/]{43}=\.[a-z0-9]+$").unwrap());
static MESSAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^%[A-Za-z0-9+/]{43}=\.[a-z0-9]+$").unwrap());
static BLOB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^&[A-Za-z0-9+/]{43}=\.[a-z0-9]+$").unwrap());
static CHANNEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#[\w+-]+$").unwrap());
static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sigil {
    Feed,
    Message,
    Blob,
    Channel,
}

impl Sigil {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '@' => Some(Sigil::Feed),
            '%' => Some(Sigil::Message),
            '&' => Some(Sigil::Blob),
            '#' => Some(Sigil::Channel),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Sigil::Feed => '@',
            Sigil::Message => '%',
            Sigil::Blob => '&',
            Sigil::Channel => '#',
        }
    }

    pub fn kind(self) -> RefKind {
        match self {
            Sigil::Feed => RefKind::Feed,
            Sigil::Message => RefKind::Message,
            Sigil::Blob => RefKind::Blob,
            Sigil::Channel => RefKind::Channel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Feed,
    Message,
    Blob,
    Channel,
    PlainUrl,
    Unknown,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefKind::Feed => "feed",
            RefKind::Message => "message",
            RefKind::Blob => "blob",
            RefKind::Channel => "channel",
            RefKind::PlainUrl => "url",
            RefKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A classified identifier. `raw` is kept exactly as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub kind: RefKind,
    pub raw: String,
}

impl Reference {
    /// Classifies `raw` without failing; unrecognized input is [`RefKind::Unknown`].
    pub fn classify(raw: &str) -> Self {
        Self {
            kind: kind_of(raw),
            raw: raw.to_owned(),
        }
    }

    /// True for feed, message and blob identifiers.
    pub fn is_ssb_ref(&self) -> bool {
        matches!(self.kind, RefKind::Feed | RefKind::Message | RefKind::Blob)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Reference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reference = Reference::classify(s);
        if reference.kind != RefKind::Unknown {
            return Ok(reference);
        }
        let first = s.chars().next().ok_or(ReferenceError::Empty)?;
        match Sigil::from_char(first) {
            Some(sigil) => Err(ReferenceError::Malformed {
                kind: sigil.kind(),
                raw: s.to_owned(),
            }),
            None => Err(ReferenceError::UnknownSigil(first)),
        }
    }
}

pub fn kind_of(raw: &str) -> RefKind {
    if is_feed(raw) {
        RefKind::Feed
    } else if is_message(raw) {
        RefKind::Message
    } else if is_blob(raw) {
        RefKind::Blob
    } else if is_channel(raw) {
        RefKind::Channel
    } else if SCHEME_RE.is_match(raw) {
        RefKind::PlainUrl
    } else {
        RefKind::Unknown
    }
}

pub fn is_feed(raw: &str) -> bool {
    FEED_RE.is_match(raw)
}

pub fn is_message(raw: &str) -> bool {
    MESSAGE_RE.is_match(raw)
}

pub fn is_blob(raw: &str) -> bool {
    BLOB_RE.is_match(raw)
}

pub fn is_channel(raw: &str) -> bool {
    CHANNEL_RE.is_match(raw)
}

/// Feed, message or blob identifier.
pub fn is_ssb_ref(raw: &str) -> bool {
    is_feed(raw) || is_message(raw) || is_blob(raw)
}
