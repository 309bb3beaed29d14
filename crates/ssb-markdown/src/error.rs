use miette::Diagnostic;
use thiserror::Error;

use crate::refs::RefKind;

#[derive(Debug, Error, Diagnostic)]
pub enum RenderError {
    #[error("failed to write html: {0}")]
    #[diagnostic(code(ssb_markdown::render::write))]
    Write(#[from] std::fmt::Error),

    #[error("no syntax definition for language `{0}`")]
    #[diagnostic(
        code(ssb_markdown::highlight::unknown_language),
        help("the block is rendered as escaped text instead")
    )]
    UnknownLanguage(String),

    #[cfg(feature = "syntax-highlighting")]
    #[error("syntax highlighting failed: {0}")]
    #[diagnostic(code(ssb_markdown::highlight::syntect))]
    Highlight(#[from] syntect::Error),

    #[cfg(not(feature = "syntax-highlighting"))]
    #[error("syntax highlighting is not compiled in")]
    #[diagnostic(code(ssb_markdown::highlight::disabled))]
    HighlightingDisabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ReferenceError {
    #[error("empty reference")]
    #[diagnostic(code(ssb_markdown::refs::empty))]
    Empty,

    #[error("unknown sigil `{0}`")]
    #[diagnostic(code(ssb_markdown::refs::unknown_sigil))]
    UnknownSigil(char),

    #[error("malformed {kind} reference: {raw}")]
    #[diagnostic(
        code(ssb_markdown::refs::malformed),
        help("identifiers are a sigil, 43 base64 characters, `=`, `.` and an algorithm tag")
    )]
    Malformed { kind: RefKind, raw: String },
}
