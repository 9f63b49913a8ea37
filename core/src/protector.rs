use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

// === Template Patterns ===

// Curly templates: {name}, {0}, {count, plural, ...}
static CURLY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^}]+\}").expect("valid curly template regex"));

// Square templates: [name], [count]
static SQUARE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]+\]").expect("valid square template regex"));

// printf style with a single conversion character: %s, %d
static PERCENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%\w").expect("valid percent specifier regex"));

// === Markup and Links ===

// HTML/XML tags: <b>, </a>, <a href="...">
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

// URLs end at whitespace or a quote
static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s"']+"#).expect("valid url regex"));

// === Social and Emoji ===

static MENTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@\w+").expect("valid mention regex"));

static HASHTAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\w+").expect("valid hashtag regex"));

// Emoji shortcodes: :smile:, :thumbs_up:
static EMOJI_CODE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":[a-zA-Z0-9_]+:").expect("valid emoji code regex"));

// Bare acronyms: API, JSON, CSS
static ACRONYM_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{2,5}\b").expect("valid acronym regex"));

// Synthetic marker emitted in place of a protected span
static MARKER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__P([0-9]+)__").expect("valid marker regex"));

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenClass {
    Curly,     // {variable}
    Square,    // [name]
    Percent,   // %s
    Tag,       // <a href="...">
    Url,       // https://example.com
    Mention,   // @username
    Hashtag,   // #topic
    EmojiCode, // :smile:
    Acronym,   // API
}

impl TokenClass {
    /// Scan order. Later classes run over text in which earlier matches are
    /// already replaced by markers.
    pub const ORDER: [TokenClass; 9] = [
        TokenClass::Curly,
        TokenClass::Square,
        TokenClass::Percent,
        TokenClass::Tag,
        TokenClass::Url,
        TokenClass::Mention,
        TokenClass::Hashtag,
        TokenClass::EmojiCode,
        TokenClass::Acronym,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            TokenClass::Curly => "CURLY",
            TokenClass::Square => "SQUARE",
            TokenClass::Percent => "PERCENT",
            TokenClass::Tag => "TAG",
            TokenClass::Url => "URL",
            TokenClass::Mention => "MENTION",
            TokenClass::Hashtag => "HASHTAG",
            TokenClass::EmojiCode => "EMOJI",
            TokenClass::Acronym => "ACRONYM",
        }
    }

    fn regex(&self) -> &'static Regex {
        match self {
            TokenClass::Curly => &CURLY_REGEX,
            TokenClass::Square => &SQUARE_REGEX,
            TokenClass::Percent => &PERCENT_REGEX,
            TokenClass::Tag => &TAG_REGEX,
            TokenClass::Url => &URL_REGEX,
            TokenClass::Mention => &MENTION_REGEX,
            TokenClass::Hashtag => &HASHTAG_REGEX,
            TokenClass::EmojiCode => &EMOJI_CODE_REGEX,
            TokenClass::Acronym => &ACRONYM_REGEX,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedToken {
    #[serde(rename = "class")]
    pub kind: TokenClass,
    pub marker: String,
    pub value: String,
}

/// A single value with its protected spans swapped for `__P<N>__` markers.
///
/// The fragment lives exactly as long as one translation round trip of the
/// value it was built from.
#[derive(Debug, Clone)]
pub struct ProtectedFragment {
    original: String,
    masked: String,
    tokens: Vec<ProtectedToken>,
}

pub struct Protector;

impl Protector {
    pub fn protect(input: &str) -> ProtectedFragment {
        let mut masked = input.to_string();
        let mut tokens: Vec<ProtectedToken> = Vec::new();

        for kind in TokenClass::ORDER {
            masked = replace_matches(&masked, kind, &mut tokens);
        }

        ProtectedFragment {
            original: input.to_string(),
            masked,
            tokens,
        }
    }
}

impl ProtectedFragment {
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn masked_text(&self) -> &str {
        &self.masked
    }

    pub fn tokens(&self) -> &[ProtectedToken] {
        &self.tokens
    }

    pub fn is_unchanged(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Puts the original spans back into `translated`.
    ///
    /// Markers the translator dropped are simply absent from the result;
    /// use [`ProtectedFragment::missing_tokens`] to detect that case.
    pub fn restore(&self, translated: &str) -> String {
        restore(translated, &self.tokens)
    }

    /// Markers present in the masked text that do not survive in `translated`.
    pub fn missing_tokens(&self, translated: &str) -> Vec<&str> {
        let surviving: Vec<&str> = MARKER_REGEX
            .find_iter(translated)
            .map(|found| found.as_str())
            .collect();

        MARKER_REGEX
            .find_iter(&self.masked)
            .map(|found| found.as_str())
            .filter(|marker| !surviving.contains(marker))
            .collect()
    }
}

/// Literal marker substitution over a token table.
///
/// Tokens are substituted newest first: a later pattern may have captured an
/// earlier marker (`#{tag}` becomes `#__P0__` and then `__P1__`), and the
/// outer value has to be expanded before the inner marker can be.
pub fn restore(translated: &str, tokens: &[ProtectedToken]) -> String {
    let mut output = translated.to_string();
    for token in tokens.iter().rev() {
        if output.contains(&token.marker) {
            output = output.replace(&token.marker, &token.value);
        }
    }
    output
}

fn replace_matches(text: &str, kind: TokenClass, tokens: &mut Vec<ProtectedToken>) -> String {
    let regex = kind.regex();
    if !regex.is_match(text) {
        return text.to_string();
    }

    let mut output = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for found in regex.find_iter(text) {
        if found.as_str().is_empty() {
            continue;
        }
        output.push_str(&text[cursor..found.start()]);
        let marker = format!("__P{}__", tokens.len());
        output.push_str(&marker);
        tokens.push(ProtectedToken {
            kind,
            marker,
            value: found.as_str().to_string(),
        });
        cursor = found.end();
    }
    output.push_str(&text[cursor..]);
    output
}
