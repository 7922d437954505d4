//! Tag recognizers.
//!
//! One recognizer per tag kind. Each returns `Ok(None)` when its marker is
//! absent, `Ok(Some(..))` for a well-formed tag and `Err` when the marker is
//! present but unreadable. [`detect`] runs all of them independently and
//! swallows the errors.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::command::{DetectedTags, Entries, PreviewTag, TagKind};
use crate::error::{TagParseError, TagResult};
use crate::kv::{parse_list, parse_pairs};

static SITEMAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[SITEMAP:([^\]\n]*)\]").expect("valid sitemap pattern"));
static METADATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[METADATA:([^\]\n]*)\]").expect("valid metadata pattern"));
static STYLES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[STYLES:([^\]\n]*)\]").expect("valid styles pattern"));
static PREVIEW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\[PREVIEW:([^\]\n]*)\](.*?)\[/PREVIEW\]").expect("valid preview pattern")
});
const PREVIEW_OPENER: &str = "[PREVIEW:";
const GENERATE_INDEX_OPENER: &str = "[GENERATE_INDEX]";

static CLEAR_PREVIEW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[CLEAR_PREVIEW\]").expect("valid clear pattern"));
static GENERATE_INDEX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\[GENERATE_INDEX\](.*?)\[/GENERATE_INDEX\]").expect("valid index pattern")
});
static APPROVED_SECTIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[GET_APPROVED_SECTIONS\]").expect("valid approved pattern"));
static EXTRA_NEWLINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline pattern"));

/// Find every tag kind in a message.
///
/// Never fails. A malformed tag is logged at debug level and left out of the
/// result; the other kinds are unaffected.
pub fn detect(text: &str) -> DetectedTags {
    DetectedTags {
        sitemap: settle(recognize_sitemap(text)),
        metadata: settle(recognize_metadata(text)),
        styles: settle(recognize_styles(text)),
        preview: settle(recognize_preview(text)),
        clear_preview: settle(recognize_clear_preview(text)).unwrap_or(false),
        generate_index: settle(recognize_generate_index(text)),
        get_approved_sections: settle(recognize_get_approved_sections(text)).unwrap_or(false),
    }
}

/// Whether the message carries at least one well-formed tag.
pub fn has_tags(text: &str) -> bool {
    !detect(text).is_empty()
}

/// The set of well-formed tag kinds in the message.
pub fn tag_kinds(text: &str) -> std::collections::BTreeSet<TagKind> {
    detect(text).kinds()
}

/// Remove tag spans so the message can be shown to the user.
///
/// Runs to a fixed point, so removing one tag can never leave behind text
/// that a second call would strip. Runs of three or more newlines collapse to
/// two and the result is trimmed.
pub fn strip_tags(text: &str) -> String {
    let mut current = strip_pass(text);
    loop {
        let next = strip_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_pass(text: &str) -> String {
    // Block tags go first: their bodies may contain brackets.
    let out = remove_blocks(text, &PREVIEW_RE, PREVIEW_OPENER);
    let mut out = remove_blocks(&out, &GENERATE_INDEX_RE, GENERATE_INDEX_OPENER);

    let patterns: [&Regex; 5] = [
        &SITEMAP_RE,
        &METADATA_RE,
        &STYLES_RE,
        &CLEAR_PREVIEW_RE,
        &APPROVED_SECTIONS_RE,
    ];
    for re in patterns {
        out = re.replace_all(&out, "").into_owned();
    }
    EXTRA_NEWLINES_RE
        .replace_all(&out, "\n\n")
        .trim()
        .to_string()
}

/// `[SITEMAP: Home, About Us, Contact]`
pub fn recognize_sitemap(text: &str) -> TagResult<Option<Vec<String>>> {
    let Some(inner) = single_line(text, TagKind::Sitemap, &SITEMAP_RE)? else {
        return Ok(None);
    };

    let pages = parse_list(inner);
    if pages.is_empty() {
        return Err(TagParseError::EmptyList(TagKind::Sitemap));
    }
    Ok(Some(pages))
}

/// `[METADATA: title=My Site, description=...]`
pub fn recognize_metadata(text: &str) -> TagResult<Option<Entries>> {
    recognize_pairs(text, TagKind::Metadata, &METADATA_RE)
}

/// `[STYLES: primaryColor=#0a0a0a, font=Inter]`
pub fn recognize_styles(text: &str) -> TagResult<Option<Entries>> {
    recognize_pairs(text, TagKind::Styles, &STYLES_RE)
}

/// `[PREVIEW: hero] <section>...</section> [/PREVIEW]`
pub fn recognize_preview(text: &str) -> TagResult<Option<PreviewTag>> {
    let kind = TagKind::Preview;
    if !text.contains(kind.marker()) {
        return Ok(None);
    }

    let Some(caps) = first_block(text, &PREVIEW_RE, PREVIEW_OPENER) else {
        return Err(if text.contains("[/PREVIEW]") {
            TagParseError::Unterminated(kind)
        } else {
            TagParseError::MissingClose(kind)
        });
    };

    let section = caps.get(1).map_or("", |m| m.as_str()).trim();
    if section.is_empty() {
        return Err(TagParseError::MissingSection(kind));
    }
    let html = caps.get(2).map_or("", |m| m.as_str()).trim();
    if html.is_empty() {
        return Err(TagParseError::EmptyBody(kind));
    }

    Ok(Some(PreviewTag {
        section: section.to_string(),
        html: html.to_string(),
    }))
}

/// `[CLEAR_PREVIEW]`
pub fn recognize_clear_preview(text: &str) -> TagResult<Option<bool>> {
    Ok(CLEAR_PREVIEW_RE.is_match(text).then_some(true))
}

/// `[GENERATE_INDEX] <!DOCTYPE html>... [/GENERATE_INDEX]`
pub fn recognize_generate_index(text: &str) -> TagResult<Option<String>> {
    let kind = TagKind::GenerateIndex;
    if !text.contains(kind.marker()) {
        return Ok(None);
    }

    let caps = first_block(text, &GENERATE_INDEX_RE, GENERATE_INDEX_OPENER)
        .ok_or(TagParseError::MissingClose(kind))?;
    let html = caps.get(1).map_or("", |m| m.as_str()).trim();
    if html.is_empty() {
        return Err(TagParseError::EmptyBody(kind));
    }
    Ok(Some(html.to_string()))
}

/// `[GET_APPROVED_SECTIONS]`
pub fn recognize_get_approved_sections(text: &str) -> TagResult<Option<bool>> {
    Ok(APPROVED_SECTIONS_RE.is_match(text).then_some(true))
}

/// First closed block matched by `re`, narrowed to the last `opener` before
/// its close. An unclosed opener earlier in the text never swallows the
/// block that follows it.
fn first_block<'t>(text: &'t str, re: &Regex, opener: &str) -> Option<Captures<'t>> {
    let outer = re.find(text)?;
    let start = outer
        .as_str()
        .rfind(opener)
        .map_or(outer.start(), |i| outer.start() + i);
    re.captures_at(text, start)
}

/// Remove every closed block, leaving unclosed openers in place.
fn remove_blocks(text: &str, re: &Regex, opener: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(span) = first_block(rest, re, opener).and_then(|caps| caps.get(0)) {
        let (start, end) = (span.start(), span.end());
        out.push_str(&rest[..start]);
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

fn recognize_pairs(text: &str, kind: TagKind, re: &Regex) -> TagResult<Option<Entries>> {
    let Some(inner) = single_line(text, kind, re)? else {
        return Ok(None);
    };

    let pairs = parse_pairs(inner);
    if pairs.is_empty() {
        return Err(TagParseError::NoValidPairs(kind));
    }
    Ok(Some(pairs))
}

fn single_line<'t>(text: &'t str, kind: TagKind, re: &Regex) -> TagResult<Option<&'t str>> {
    if !text.contains(kind.marker()) {
        return Ok(None);
    }
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| Some(m.as_str()))
        .ok_or(TagParseError::Unterminated(kind))
}

fn settle<T>(outcome: TagResult<Option<T>>) -> Option<T> {
    match outcome {
        Ok(value) => value,
        Err(e) => {
            debug!("Ignoring malformed {} tag: {}", e.kind(), e);
            None
        }
    }
}
