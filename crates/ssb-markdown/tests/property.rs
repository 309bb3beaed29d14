use std::panic;
use std::sync::LazyLock;

use regex::Regex;

use ssb_markdown::utils::collapse_newlines;
use ssb_markdown::{Linkifier, RenderConfig, Sigil, render_block, render_inline};

const CASES: usize = 200;
const MAX_LEN: usize = 384;
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 \
\n\t#@%&*`[](){}!<>:+-_=./\\\"'~|";
const SNIPPETS: &[&str] = &[
    "http://example.com",
    "%qcdW859vSp/bQCA8qiPsirrCrjlIUHeq80QRjhCKYvU=.sha256",
    "&RRELXJAxum631eq1ikj7+qngd3f6Dvz7eA1mZNHBPQ0=.sha256",
    "@uikkwUQU4dcd/ZrHU7JstnkTgncxQB2A8PDLHV9wDAs=.ed25519",
    ":cake:",
    "\u{2764}\u{FE0F}",
    "<script>",
    "```",
    "![x](",
    "caf\u{e9}",
];

#[test]
fn render_never_panics_on_random_input() -> Result<(), Box<dyn std::error::Error>> {
    let config = RenderConfig::new().with_emoji(|name| format!("<i>{name}</i>"));
    let mut rng = Lcg::new(0x5eed_2b1f_8c03_77d1);
    for case in 0..CASES {
        let source = random_source(&mut rng);
        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            let _ = render_block(&source, &config);
            let _ = render_inline(&source, &config);
        }));
        if result.is_err() {
            return Err(format!("render panicked for case {}: {:?}", case, source).into());
        }
    }
    Ok(())
}

#[test]
fn user_markup_is_always_escaped() -> Result<(), Box<dyn std::error::Error>> {
    let config = RenderConfig::default();
    let mut rng = Lcg::new(0x0bad_c0de_1234_5678);
    for case in 0..CASES {
        let source = format!("{} <script>x</script> {}", random_source(&mut rng), random_source(&mut rng));
        for html in [render_block(&source, &config), render_inline(&source, &config)] {
            if let Some(at) = stray_markup(&html) {
                return Err(format!(
                    "unescaped markup at byte {} for case {}: {:?}\n{}",
                    at, case, source, html
                )
                .into());
            }
        }
    }
    Ok(())
}

#[test]
fn output_has_no_variation_selectors() -> Result<(), Box<dyn std::error::Error>> {
    let config = RenderConfig::default();
    let mut rng = Lcg::new(0x7e57_fe0f_0000_0001);
    for case in 0..CASES {
        let source = random_source(&mut rng);
        let html = render_block(&source, &config);
        if html.contains('\u{FE0F}') {
            return Err(format!("variation selector kept for case {}: {:?}", case, source).into());
        }
    }
    Ok(())
}

#[test]
fn inline_output_is_collapsed() -> Result<(), Box<dyn std::error::Error>> {
    let config = RenderConfig::default();
    let mut rng = Lcg::new(0x1d3e_9a77_4c21_b0e5);
    for case in 0..CASES {
        let source = random_source(&mut rng);
        let html = render_inline(&source, &config);
        if collapse_newlines(&html) != html {
            return Err(format!("inline output not collapsed for case {}: {:?}", case, source).into());
        }
        let body = html.trim_end_matches('\n');
        if body.contains('\n') {
            return Err(format!("inner newline for case {}: {:?}", case, source).into());
        }
    }
    Ok(())
}

#[test]
fn sigil_matches_are_exact() {
    let config = RenderConfig::default();
    let linkifier = Linkifier::new(&config);
    let mut rng = Lcg::new(0x44a1_0c9b_e2f7_3d05);
    let alphabet = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    for _ in 0..CASES {
        let mut body: String = (0..43)
            .map(|_| alphabet[rng.gen_range(0, alphabet.len())] as char)
            .collect();
        body.push_str("=.sha256");
        for sigil in [Sigil::Message, Sigil::Blob, Sigil::Feed] {
            let text = format!("{}{body},extra", sigil.as_char());
            assert_eq!(linkifier.sigil_len(sigil, &text[1..]), body.len(), "{text}");
        }
    }
}

/// Tags the renderer itself writes.
static OWN_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^</?(?:p|br|h[1-6]|hr|table|thead|tbody|tr|th|td|blockquote|ul|ol|li|em|strong|s|code|pre|a|img|audio|video|span)[\s/>]",
    )
    .unwrap()
});
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^&(?:amp|lt|gt|quot|#39|#x27);").unwrap());

/// Byte offset of the first `<` that does not open a renderer tag or `&`
/// that does not start an escape.
fn stray_markup(html: &str) -> Option<usize> {
    html.char_indices().find_map(|(i, c)| {
        let ok = match c {
            '<' => OWN_TAG_RE.is_match(&html[i..]),
            '&' => ENTITY_RE.is_match(&html[i..]),
            _ => true,
        };
        (!ok).then_some(i)
    })
}

fn random_source(rng: &mut Lcg) -> String {
    let len = rng.gen_range(0, MAX_LEN + 1);
    let mut out = String::with_capacity(len);
    while out.len() < len {
        if rng.gen_range(0, 16) == 0 {
            out.push_str(SNIPPETS[rng.gen_range(0, SNIPPETS.len())]);
        } else {
            let idx = rng.gen_range(0, CHARSET.len());
            let byte = CHARSET.get(idx).copied().unwrap_or(b' ');
            out.push(byte as char);
        }
    }
    out
}

struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.state
    }

    fn gen_range(&mut self, min: usize, max: usize) -> usize {
        if max <= min {
            return min;
        }
        let span = max - min;
        let value = (self.next() >> 1) as usize;
        min + (value % span)
    }
}
