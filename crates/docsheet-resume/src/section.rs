//! Heading detection and line-to-section segmentation.
//!
//! Segmentation is a fold of [`step`] over the input lines: a line that is
//! exactly a known heading switches the current section, any other line is
//! appended to the current section, and lines before the first heading are
//! dropped.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use docsheet_core::SectionName;

/// Heading patterns, tested in order. Each matches a whole line,
/// case-insensitively, with an optional trailing colon.
static HEADINGS: Lazy<Vec<(SectionName, Regex)>> = Lazy::new(|| {
    [
        (
            SectionName::Contact,
            r"contact(?:\s+(?:information|info|details))?|personal\s+(?:information|details)",
        ),
        (
            SectionName::Summary,
            r"(?:professional\s+|career\s+)?(?:summary|profile|objective)|about\s+me",
        ),
        (
            SectionName::Experience,
            r"(?:work\s+|professional\s+|employment\s+)?experience|employment(?:\s+history)?|work\s+history",
        ),
        (
            SectionName::Skills,
            r"(?:technical\s+|core\s+|key\s+)?skills|competencies",
        ),
        (
            SectionName::Education,
            r"education|academic\s+background|qualifications",
        ),
        (SectionName::Projects, r"(?:personal\s+|academic\s+|key\s+)?projects"),
        (
            SectionName::Certifications,
            r"certifications?|licenses(?:\s+(?:and|&)\s+certifications)?",
        ),
        (
            SectionName::Awards,
            r"awards?(?:\s+(?:and|&)\s+honou?rs)?|honou?rs(?:\s+(?:and|&)\s+awards)?|achievements",
        ),
        (SectionName::Languages, r"languages?"),
        (
            SectionName::Volunteer,
            r"volunteer(?:ing|\s+experience|\s+work)?",
        ),
    ]
    .into_iter()
    .map(|(name, body)| {
        let pattern = format!(r"(?i)^\s*(?:{body})\s*:?\s*$");
        (name, Regex::new(&pattern).unwrap())
    })
    .collect()
});

/// Section named by `line` if the whole line is a heading.
pub fn match_heading(line: &str) -> Option<SectionName> {
    HEADINGS
        .iter()
        .find(|(_, re)| re.is_match(line))
        .map(|(name, _)| *name)
}

/// Segmenter state threaded through [`step`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentState {
    pub current: Option<SectionName>,
    /// Raw lines per section, in order of first heading appearance.
    pub sections: IndexMap<SectionName, Vec<String>>,
}

/// Advance the segmenter by one line.
pub fn step(mut state: SegmentState, line: &str) -> SegmentState {
    if let Some(name) = match_heading(line) {
        // A repeated heading starts over; only its last block survives.
        if state.sections.insert(name, Vec::new()).is_some() {
            tracing::debug!(section = name.as_str(), "repeated heading replaces earlier block");
        }
        state.current = Some(name);
        return state;
    }

    if let Some(name) = state.current
        && let Some(lines) = state.sections.get_mut(&name)
    {
        lines.push(line.to_string());
    }
    state
}

/// Split `text` into raw per-section line lists.
pub fn segment(text: &str) -> IndexMap<SectionName, Vec<String>> {
    text.lines().fold(SegmentState::default(), step).sections
}
