//! Tolerant SRT parsing and strict SRT composition.
//!
//! The parser accepts the block grammar `index / timestamp line / content
//! lines` with the usual real-world damage: BOM, CRLF or mixed line
//! endings, `.` as the millisecond separator, sloppy arrows (`- >`), and
//! non-monotonic indices. The composer always emits canonical SRT:
//! comma separator, one blank line between blocks, single trailing eol.

use super::{Cue, Timestamp};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed timestamp line at byte {0}")]
    BadTimestamp(usize),

    #[error("Malformed cue index at byte {0}")]
    BadIndex(usize),

    #[error("Unexpected end of input")]
    UnexpectedEof,
}

/// Line ending used when composing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eol {
    #[default]
    Lf,
    CrLf,
}

impl Eol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Eol::Lf => "\n",
            Eol::CrLf => "\r\n",
        }
    }
}

/// Options for [`compose`].
///
/// `strict` removes blank lines inside cue content, which would otherwise
/// terminate the block early on re-parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeOptions {
    pub reindex: bool,
    pub start_index: usize,
    pub strict: bool,
    pub eol: Eol,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            reindex: true,
            start_index: 1,
            strict: true,
            eol: Eol::Lf,
        }
    }
}

fn timing_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[ \t]*(\d+:\d{2}:\d{2}[,.]\d{3})[ \t]*-[ -][ \t]*>[ \t]*(\d+:\d{2}:\d{2}[,.]\d{3})(?:[ \t]+(.*?))?[ \t]*$",
        )
        .expect("timing regex")
    })
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn parse_index_line(line: &str) -> Option<usize> {
    let trimmed = line.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

fn parse_timing_line(line: &str) -> Option<(Timestamp, Timestamp, Option<String>)> {
    let caps = timing_re().captures(line)?;
    let start = Timestamp::parse(&caps[1])?;
    let end = Timestamp::parse(&caps[2])?;
    let proprietary = caps
        .get(3)
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty());
    Some((start, end, proprietary))
}

/// Lines with their byte offsets, eol stripped.
fn split_lines(input: &str) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in input.split_inclusive('\n') {
        let line = raw
            .strip_suffix('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .unwrap_or_else(|| raw.strip_suffix('\r').unwrap_or(raw));
        lines.push((offset, line));
        offset += raw.len();
    }
    lines
}

/// A cue header is an index line immediately followed by a timestamp line.
fn header_at(lines: &[(usize, &str)], i: usize) -> bool {
    parse_index_line(lines[i].1).is_some()
        && lines
            .get(i + 1)
            .map_or(false, |&(_, next)| timing_re().is_match(next))
}

fn skip_to_blank(lines: &[(usize, &str)], mut i: usize) -> usize {
    while i < lines.len() && !is_blank(lines[i].1) {
        i += 1;
    }
    i
}

/// Parse SRT text into an ordered cue list.
///
/// With `ignore_errors` a malformed block (stray preamble included) is
/// skipped to the next blank line and parsing continues; otherwise the
/// error carries the byte offset of the offending line.
pub fn parse(input: &str, ignore_errors: bool) -> Result<Vec<Cue>, ParseError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let lines = split_lines(input);
    let mut cues = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if is_blank(lines[i].1) {
            i += 1;
            continue;
        }

        let (index_offset, index_line) = lines[i];
        let Some(index) = parse_index_line(index_line) else {
            if ignore_errors {
                i = skip_to_blank(&lines, i);
                continue;
            }
            return Err(ParseError::BadIndex(index_offset));
        };

        let Some(&(timing_offset, timing_line)) = lines.get(i + 1) else {
            if ignore_errors {
                break;
            }
            return Err(ParseError::UnexpectedEof);
        };
        let timing = parse_timing_line(timing_line)
            .filter(|(start, end, _)| start <= end);
        let Some((start, end, proprietary)) = timing else {
            if ignore_errors {
                i = skip_to_blank(&lines, i);
                continue;
            }
            return Err(ParseError::BadTimestamp(timing_offset));
        };

        i += 2;

        // Leading blank lines of a content block are dropped. A following
        // cue header means this cue simply has no content.
        let mut first = i;
        while first < lines.len() && is_blank(lines[first].1) {
            first += 1;
        }
        let mut content_lines: Vec<&str> = Vec::new();
        i = first;
        if i < lines.len() && !header_at(&lines, i) {
            while i < lines.len() && !is_blank(lines[i].1) && !header_at(&lines, i) {
                content_lines.push(lines[i].1);
                i += 1;
            }
        }

        cues.push(Cue {
            index: Some(index),
            start,
            end,
            proprietary,
            content: content_lines.join("\n"),
        });
    }

    Ok(cues)
}

/// Compose cues into SRT text.
pub fn compose(cues: &[Cue], options: &ComposeOptions) -> String {
    compose_iter(cues.iter(), options)
}

/// Iterator form of [`compose`], used where a chunk spans several buffers.
pub fn compose_iter<'a, I>(cues: I, options: &ComposeOptions) -> String
where
    I: IntoIterator<Item = &'a Cue>,
{
    let eol = options.eol.as_str();
    let mut out = String::new();

    for (position, cue) in cues.into_iter().enumerate() {
        let index = if options.reindex {
            options.start_index + position
        } else {
            cue.index.unwrap_or(options.start_index + position)
        };

        if !out.is_empty() {
            out.push_str(eol);
        }
        out.push_str(&index.to_string());
        out.push_str(eol);
        out.push_str(&cue.start.to_string());
        out.push_str(" --> ");
        out.push_str(&cue.end.to_string());
        if let Some(proprietary) = &cue.proprietary {
            out.push(' ');
            out.push_str(proprietary);
        }
        out.push_str(eol);

        for line in cue.content.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if options.strict && line.trim().is_empty() {
                continue;
            }
            out.push_str(line);
            out.push_str(eol);
        }
    }

    out
}
