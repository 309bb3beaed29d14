use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use pulldown_cmark::Options;

use crate::refs;

/// Resolves a reference (sigil identifier, `#channel`, mention or href) to
/// a destination. `None` or an empty string means "not recognized".
pub type ToUrlFn = dyn Fn(&str, bool) -> Option<String> + Send + Sync;
/// Maps an image source to the href of the link wrapped around it.
pub type ImageLinkFn = dyn Fn(&str) -> String + Send + Sync;
/// Produces the HTML fragment that replaces an emoji, given its shortcode name.
pub type EmojiFn = dyn Fn(&str) -> String + Send + Sync;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct RenderOptions: u32 {
        /// Soft line breaks render as `<br>`.
        const HARD_BREAKS = 1 << 1;
        const SMART_PUNCTUATION = 1 << 2;
        /// Bare URLs and sigil identifiers become links.
        const LINKIFY = 1 << 3;
        const HASHTAGS = 1 << 4;
        /// `:name:` shortcodes become emoji glyphs.
        const EMOJI_SHORTCODES = 1 << 5;
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::HARD_BREAKS | Self::LINKIFY | Self::HASHTAGS | Self::EMOJI_SHORTCODES
    }
}

impl RenderOptions {
    pub fn parser_options(&self) -> Options {
        let mut options =
            Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
        if self.contains(Self::SMART_PUNCTUATION) {
            options |= Options::ENABLE_SMART_PUNCTUATION;
        }
        options
    }
}

/// Decoration applied to links the resolver did not recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkPolicy {
    /// Add `target="_blank"`.
    pub new_tab: bool,
    /// Add `rel="noopener"`.
    pub noopener: bool,
    /// Leave fragment-only hrefs (`#section`) undecorated.
    pub exempt_fragments: bool,
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            new_tab: true,
            noopener: true,
            exempt_fragments: false,
        }
    }
}

impl LinkPolicy {
    /// No decoration at all.
    pub fn plain() -> Self {
        Self {
            new_tab: false,
            noopener: false,
            exempt_fragments: false,
        }
    }

    pub fn applies_to(&self, href: &str) -> bool {
        !(self.exempt_fragments && href.starts_with('#'))
    }
}

/// Everything a render call needs from its caller.
///
/// Built with the `with_*` methods and passed by reference to
/// [`render_block`](crate::render_block) / [`render_inline`](crate::render_inline);
/// nothing is global, so one config may serve many threads.
#[derive(Clone, Default)]
pub struct RenderConfig {
    to_url: Option<Arc<ToUrlFn>>,
    image_link: Option<Arc<ImageLinkFn>>,
    emoji: Option<Arc<EmojiFn>>,
    protocols: BTreeSet<String>,
    pub options: RenderOptions,
    pub link_policy: LinkPolicy,
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_to_url<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, bool) -> Option<String> + Send + Sync + 'static,
    {
        self.to_url = Some(Arc::new(f));
        self
    }

    pub fn with_image_link<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.image_link = Some(Arc::new(f));
        self
    }

    pub fn with_emoji<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.emoji = Some(Arc::new(f));
        self
    }

    /// Adds a URL scheme (e.g. `"ssb"`) recognized by the autolinker.
    pub fn with_protocol(mut self, scheme: impl AsRef<str>) -> Self {
        self.protocols.insert(scheme.as_ref().to_ascii_lowercase());
        self
    }

    pub fn with_protocols<I, S>(self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        schemes
            .into_iter()
            .fold(self, |config, scheme| config.with_protocol(scheme))
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_link_policy(mut self, policy: LinkPolicy) -> Self {
        self.link_policy = policy;
        self
    }

    /// Runs the resolver. Empty results count as unresolved.
    pub fn to_url(&self, reference: &str, is_image: bool) -> Option<String> {
        let resolved = match &self.to_url {
            Some(f) => f(reference, is_image),
            None => default_to_url(reference, is_image),
        };
        resolved.filter(|url| !url.is_empty())
    }

    pub fn image_link(&self, reference: &str) -> String {
        match &self.image_link {
            Some(f) => f(reference),
            None => reference.to_owned(),
        }
    }

    pub fn emoji(&self, name: &str) -> Option<String> {
        self.emoji.as_ref().map(|f| f(name))
    }

    pub fn has_emoji(&self) -> bool {
        self.emoji.is_some()
    }

    /// Schemes the autolinker accepts: http, https, ftp and dat plus any added ones.
    pub fn accepts_scheme(&self, scheme: &str) -> bool {
        let scheme = scheme.to_ascii_lowercase();
        DEFAULT_PROTOCOLS.contains(&scheme.as_str()) || self.protocols.contains(&scheme)
    }
}

const DEFAULT_PROTOCOLS: [&str; 4] = ["http", "https", "ftp", "dat"];

/// Resolver used when the caller supplies none: classified identifiers and
/// channels resolve to themselves, everything else is unrecognized.
pub fn default_to_url(reference: &str, _is_image: bool) -> Option<String> {
    (refs::is_ssb_ref(reference) || refs::is_channel(reference)).then(|| reference.to_owned())
}

impl fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderConfig")
            .field("to_url", &self.to_url.is_some())
            .field("image_link", &self.image_link.is_some())
            .field("emoji", &self.emoji.is_some())
            .field("protocols", &self.protocols)
            .field("options", &self.options)
            .field("link_policy", &self.link_policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSG: &str = "%qcdW859vSp/bQCA8qiPsirrCrjlIUHeq80QRjhCKYvU=.sha256";

    #[test]
    fn default_resolver_is_identity_for_refs() {
        let config = RenderConfig::default();
        assert_eq!(config.to_url(MSG, false).as_deref(), Some(MSG));
        assert_eq!(config.to_url("#ssb", false).as_deref(), Some("#ssb"));
        assert_eq!(config.to_url("http://example.com", false), None);
        assert_eq!(config.to_url("@paul", false), None);
    }

    #[test]
    fn empty_resolution_is_unresolved() {
        let config = RenderConfig::new().with_to_url(|_, _| Some(String::new()));
        assert_eq!(config.to_url(MSG, false), None);
    }

    #[test]
    fn protocols_extend_defaults() {
        let config = RenderConfig::new().with_protocols(["SSB", "magnet"]);
        assert!(config.accepts_scheme("ssb"));
        assert!(config.accepts_scheme("Magnet"));
        assert!(config.accepts_scheme("dat"));
        assert!(!config.accepts_scheme("javascript"));
    }

    #[test]
    fn policy_fragment_exemption() {
        let policy = LinkPolicy {
            exempt_fragments: true,
            ..LinkPolicy::default()
        };
        assert!(!policy.applies_to("#intro"));
        assert!(policy.applies_to("https://example.com/#intro"));
        assert!(LinkPolicy::default().applies_to("#intro"));
    }

    #[test]
    fn default_options() {
        let options = RenderOptions::default();
        assert!(options.contains(RenderOptions::HARD_BREAKS | RenderOptions::LINKIFY));
        assert!(!options.contains(RenderOptions::SMART_PUNCTUATION));
        assert!(!options.parser_options().contains(Options::ENABLE_SMART_PUNCTUATION));
    }
}
