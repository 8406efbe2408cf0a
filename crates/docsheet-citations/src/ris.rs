//! Line-tagged citation exports: RIS (`TY  - JOUR`), NBIB (`AU  - Doe J`)
//! and EndNote tagged (`%A Doe, J.`).
//!
//! Parsing is a fold of [`step`] over the input lines. Blank lines close an
//! entry, tag lines are merged into the current entry, and anything else is
//! skipped so that dialect quirks never abort a file.

use once_cell::sync::Lazy;
use regex::Regex;

use docsheet_core::{CanonicalField, EntryRecord};

/// Where the parser is relative to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    OutsideEntry,
    InsideEntry,
}

/// Parser state threaded through [`step`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineState {
    pub phase: Phase,
    pub current: EntryRecord,
    pub emitted: Vec<EntryRecord>,
}

/// Split a line into `(tag, value)` if it is a tag line.
///
/// Accepted forms:
/// - `TAG  - value` or `TAG % value` (RIS / NBIB)
/// - `%T value` (EndNote tagged)
pub fn split_tag_line(line: &str) -> Option<(&str, &str)> {
    static PERCENT_TAG: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^%([^\s%]{1,3})\s+(.*)$").unwrap());
    static DASH_TAG: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^([A-Z][A-Z0-9]{0,3})\s*[-%]\s+(.*)$").unwrap());

    let caps = PERCENT_TAG
        .captures(line)
        .or_else(|| DASH_TAG.captures(line))?;
    let tag = caps.get(1)?.as_str();
    let value = caps.get(2).map_or("", |m| m.as_str()).trim_end();
    Some((tag, value))
}

/// Canonical field for a tag, or `None` for passthrough tags.
pub fn canonical_field(tag: &str) -> Option<CanonicalField> {
    let field = match tag {
        "A" | "AU" => CanonicalField::Authors,
        "T" | "TI" => CanonicalField::Title,
        "J" | "JO" => CanonicalField::Journal,
        "D" | "PY" => CanonicalField::Year,
        "DO" | "DOI" => CanonicalField::Doi,
        "V" => CanonicalField::Volume,
        "N" => CanonicalField::Issue,
        "P" => CanonicalField::Pages,
        "U" => CanonicalField::Url,
        "X" => CanonicalField::Abstract,
        _ => return None,
    };
    Some(field)
}

fn merge_tag(entry: &mut EntryRecord, tag: &str, value: &str) {
    match canonical_field(tag) {
        Some(field) => entry.set(field, value),
        None => entry.insert_extra(tag, value),
    }
}

/// Advance the parser by one line.
pub fn step(mut state: LineState, line: &str) -> LineState {
    if line.trim().is_empty() {
        if state.phase == Phase::InsideEntry && !state.current.is_empty() {
            let entry = std::mem::take(&mut state.current);
            state.emitted.push(entry);
            state.phase = Phase::OutsideEntry;
        }
        return state;
    }

    if let Some((tag, value)) = split_tag_line(line) {
        merge_tag(&mut state.current, tag, value);
        state.phase = Phase::InsideEntry;
    }
    state
}

/// Flush the trailing entry at end of input.
pub fn finish(mut state: LineState) -> Vec<EntryRecord> {
    if !state.current.is_empty() {
        state.emitted.push(state.current);
    }
    state.emitted
}

/// Parse RIS, NBIB or EndNote tagged text into entry records.
pub fn parse_ris_family(text: &str) -> Vec<EntryRecord> {
    finish(text.lines().fold(LineState::default(), step))
}
