//! Text sanitizers applied to caller-supplied strings.
//!
//! These mirror the platform's own input hygiene: plain text fields lose
//! markup and control characters, slugs are reduced to lowercase words
//! joined by hyphens, rich content keeps its markup minus executable parts.

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_OR_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static EVENT_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).unwrap());
static JS_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)javascript\s*:").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{Ll}\p{N}]+").unwrap());
static NON_USERNAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9 _.\-@]").unwrap());
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)+$").unwrap()
});

/// Remove every tag, dropping `<script>`/`<style>` elements with their content.
pub fn strip_tags(input: &str) -> String {
    let without_code = SCRIPT_OR_STYLE.replace_all(input, "");
    TAG.replace_all(&without_code, "").into_owned()
}

/// Single-line plain text: no tags, no control characters, whitespace
/// collapsed, trimmed.
pub fn sanitize_text(input: &str) -> String {
    let stripped = strip_tags(input);
    let printable: String = stripped
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    WHITESPACE.replace_all(&printable, " ").trim().to_string()
}

/// Multi-line plain text: like [`sanitize_text`] but line breaks survive.
pub fn sanitize_textarea(input: &str) -> String {
    let stripped = strip_tags(input);
    stripped
        .lines()
        .map(|line| {
            let printable: String = line.chars().filter(|c| !c.is_control()).collect();
            printable.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Rich content: markup is kept, scripts, styles, event handler attributes
/// and `javascript:` URLs are removed.
pub fn sanitize_html(input: &str) -> String {
    let without_code = SCRIPT_OR_STYLE.replace_all(input, "");
    let without_events = EVENT_ATTR.replace_all(&without_code, "");
    JS_URL.replace_all(&without_events, "").trim().to_string()
}

/// URL slug: lowercase letters and digits joined by single hyphens.
pub fn sanitize_title(input: &str) -> String {
    let lowered = strip_tags(input).to_lowercase();
    NON_SLUG
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Login name: letters, digits, space and `_ . - @`; whitespace collapsed.
pub fn sanitize_user(input: &str) -> String {
    let stripped = strip_tags(input);
    let kept = NON_USERNAME.replace_all(&stripped, "");
    WHITESPACE.replace_all(&kept, " ").trim().to_string()
}

/// Returns the trimmed address when it is syntactically valid.
pub fn sanitize_email(input: &str) -> Option<String> {
    let trimmed = input.trim();
    EMAIL.is_match(trimmed).then(|| trimmed.to_string())
}

/// Plain-text summary of at most `limit` words, with an ellipsis when cut.
pub fn trim_words(input: &str, limit: usize) -> String {
    let text = strip_tags(input);
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > limit {
        format!("{}\u{2026}", words[..limit].join(" "))
    } else {
        words.join(" ")
    }
}
