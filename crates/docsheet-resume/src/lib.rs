//! Resume segmentation: split extracted text into named sections by heading,
//! then reshape each section with its formatter.

pub mod format;
pub mod section;

use docsheet_core::{FieldValue, ResumeSection};

pub use format::{format_education, format_experience, format_section, format_skills};
pub use section::{SegmentState, match_heading, segment, step};

/// Segment and format `text`.
///
/// Returns sections in order of first heading appearance. Sections whose
/// formatted content is empty are omitted, so text without any recognised
/// heading yields an empty vector.
pub fn segment_resume(text: &str) -> Vec<ResumeSection> {
    let sections: Vec<ResumeSection> = segment(text)
        .into_iter()
        .map(|(name, lines)| ResumeSection {
            name,
            content: format_section(name, &lines),
        })
        .filter(|section| match &section.content {
            FieldValue::Text(text) => !text.trim().is_empty(),
            FieldValue::List(items) => !items.is_empty(),
        })
        .collect();

    tracing::debug!(sections = sections.len(), "segmented resume text");
    sections
}
