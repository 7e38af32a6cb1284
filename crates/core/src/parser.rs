//! # Response Parser
//!
//! Extracts structured fields from free-text model output. Each extraction
//! mode tries an ordered list of strategies (strict marker first, lenient
//! fallback last) and returns a tagged [`ParseFailure`] instead of panicking.
//! Markers are accepted in English and Chinese regardless of prompt language.
//!
//! Pure: no I/O, no state.

use crate::error::{ParseFailure, ParseFailureReason, ParseMode};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Verdict of the synthesis step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub sufficient: bool,
    /// Seed for the next round; present iff `sufficient` is false
    pub next_query: Option<String>,
    /// Free-text justification, empty when none was given
    pub rationale: String,
    /// Final report; present iff `sufficient` is true
    pub report: Option<String>,
}

impl Decision {
    pub fn stop(report: impl Into<String>) -> Self {
        Self {
            sufficient: true,
            next_query: None,
            rationale: String::new(),
            report: Some(report.into()),
        }
    }

    pub fn continue_with(next_query: impl Into<String>) -> Self {
        Self {
            sufficient: false,
            next_query: Some(next_query.into()),
            rationale: String::new(),
            report: None,
        }
    }
}

/// Result of [`parse`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Query(String),
    Decision(Decision),
}

const COLON: &str = r"[ \t]*(?:\*\*)?[ \t]*[:：][ \t]*(?:\*\*)?[ \t]*";

/// Markers that name a *new* query. They win over generic markers anywhere
/// in the text, so a synthesis answer that quotes an earlier `query:` still
/// yields its new query.
static STRONG_QUERY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:the\s+query\s+is|(?:next|new)\s+(?:search\s+)?query(?:\s+is)?|新的检索\s*query|新的\s*query\s*是?){COLON}([^\r\n]*)"
    ))
    .expect("strong query marker is valid")
});

static QUERY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:search\s+query|检索\s*query|query){COLON}([^\r\n]*)"
    ))
    .expect("query marker is valid")
});

/// Negative forms come first so `insufficient` is never read as `sufficient`
const VERDICT: &str =
    r"(?P<verdict>insufficient|not\s+sufficient|not\s+enough|sufficient|enough|不充足|不足|充足)";

/// `Sufficiency: sufficient`, `Sufficiency: the information is sufficient`,
/// or the label with the verdict bulleted on the next line
static LABELLED_VERDICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:information\s+sufficiency|sufficiency|信息充足性|verdict)[ \t]*(?:\*\*)?[ \t]*[:：]?[ \t]*(?:\*\*)?[ \t]*(?:\r?\n[ \t]*)?(?:[-*•][ \t]*)?(?P<filler>[^\r\n]{{0,32}}?){VERDICT}(?:\*\*)?"
    ))
    .expect("labelled verdict is valid")
});

/// A bullet line that contains nothing but a verdict
static BULLET_VERDICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?im)^[ \t]*[-*•][ \t]*(?:\*\*)?{VERDICT}(?:\*\*)?[ \t]*[.。!！]?[ \t]*\r?$"
    ))
    .expect("bullet verdict is valid")
});

/// Negation inside the words between a label and its verdict
static NEGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bnot\b|\bno\b|不|未|没有").expect("negation pattern is valid")
});

static REPORT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:final\s+report|analysis\s+report|report|分析报告|最终报告){COLON}"
    ))
    .expect("report marker is valid")
});

static RATIONALE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(?:rationale|reason|原因){COLON}([^\r\n]*)"))
        .expect("rationale marker is valid")
});

/// Parse `text` in the given mode
pub fn parse(text: &str, mode: ParseMode) -> Result<Parsed, ParseFailure> {
    match mode {
        ParseMode::ExtractQuery => extract_query(text).map(Parsed::Query),
        ParseMode::ExtractDecision => extract_decision(text).map(Parsed::Decision),
    }
}

/// Extract one search query.
///
/// Explicit marker first; otherwise the last non-empty line. A marker whose
/// value is empty is a failure, not a reason to fall back.
pub fn extract_query(text: &str) -> Result<String, ParseFailure> {
    let fail = |reason| ParseFailure::new(ParseMode::ExtractQuery, reason);

    if text.trim().is_empty() {
        return Err(fail(ParseFailureReason::EmptyText));
    }

    if let Some(query) = marked_query(text) {
        return Ok(query);
    }
    if has_query_marker(text) {
        return Err(fail(ParseFailureReason::NoQuery));
    }

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_string)
        .ok_or_else(|| fail(ParseFailureReason::NoQuery))
}

/// Extract a stop-or-continue decision.
///
/// No verdict marker at all counts as insufficient.
pub fn extract_decision(text: &str) -> Result<Decision, ParseFailure> {
    let fail = |reason| ParseFailure::new(ParseMode::ExtractDecision, reason);

    if text.trim().is_empty() {
        return Err(fail(ParseFailureReason::EmptyText));
    }

    let rationale = first_marked_value(&RATIONALE_MARKER, text).unwrap_or_default();

    match find_verdict(text) {
        Some((true, verdict_end)) => {
            let rest = &text[verdict_end..];
            let report = match REPORT_MARKER.find(rest) {
                Some(marker) => rest[marker.end()..].trim(),
                None => rest.trim(),
            };
            if report.is_empty() {
                return Err(fail(ParseFailureReason::MissingReport));
            }
            Ok(Decision {
                sufficient: true,
                next_query: None,
                rationale,
                report: Some(report.to_string()),
            })
        }
        Some((false, _)) | None => {
            let next_query =
                marked_query(text).ok_or_else(|| fail(ParseFailureReason::MissingNextQuery))?;
            Ok(Decision {
                sufficient: false,
                next_query: Some(next_query),
                rationale,
                report: None,
            })
        }
    }
}

/// Labelled verdict first, then a bare bulleted verdict.
/// Returns (sufficient, byte offset just past the verdict).
fn find_verdict(text: &str) -> Option<(bool, usize)> {
    [&*LABELLED_VERDICT, &*BULLET_VERDICT]
        .into_iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| {
            let word = caps.name("verdict")?;
            let filler = caps.name("filler").map_or("", |m| m.as_str());
            let end = caps.get(0)?.end();
            Some((is_positive(word.as_str()) && !NEGATION.is_match(filler), end))
        })
}

fn is_positive(verdict: &str) -> bool {
    let verdict = verdict.to_lowercase();
    !(verdict.starts_with("in") || verdict.starts_with("not") || verdict.starts_with('不'))
}

fn has_query_marker(text: &str) -> bool {
    STRONG_QUERY_MARKER.is_match(text) || QUERY_MARKER.is_match(text)
}

fn marked_query(text: &str) -> Option<String> {
    first_marked_value(&STRONG_QUERY_MARKER, text)
        .or_else(|| first_marked_value(&QUERY_MARKER, text))
}

/// First match whose captured value is non-empty after cleaning
fn first_marked_value(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| clean_value(m.as_str())))
        .find(|value| !value.is_empty())
}

/// Trim whitespace and bold markers, then drop one layer of wrapping quotes
fn clean_value(raw: &str) -> String {
    let value = raw.trim().trim_matches('*').trim();
    let pairs = [
        ('"', '"'),
        ('\'', '\''),
        ('`', '`'),
        ('<', '>'),
        ('“', '”'),
        ('「', '」'),
        ('[', ']'),
    ];
    for (open, close) in pairs {
        if value.chars().count() >= 2 && value.starts_with(open) && value.ends_with(close) {
            let inner = &value[open.len_utf8()..value.len() - close.len_utf8()];
            return inner.trim().to_string();
        }
    }
    value.to_string()
}
