use once_cell::sync::Lazy;
use regex::Regex;

use docsheet_core::{FieldValue, SectionName};

const MONTH: &str = r"(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)[a-z]*\.?";

/// Start of an experience entry: a year range (`2019 - 2021`, `2022 – Present`),
/// a month-led date (`Mar 2020`, optionally a range), or a bare `Present`.
static EXPERIENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        r"\b\d{{4}}\s*[-–]\s*(?:\d{{4}}|Present)\b|\b{MONTH}\s+\d{{4}}(?:\s*[-–]\s*(?:{MONTH}\s+\d{{4}}|\d{{4}}|Present))?|\bPresent\b"
    );
    Regex::new(&pattern).unwrap()
});

/// Start of an education entry: a degree keyword.
static DEGREE_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bB\.|\bBachelor|\bM\.|\bMaster|\bPh\.?D|\bDiploma").unwrap()
});

static SKILL_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;•·\n]").unwrap());

/// Split `text` so that every boundary match begins a new entry. Text before
/// the first boundary is kept as its own entry; blank entries are dropped.
fn split_at_boundaries(text: &str, boundary: &Regex) -> Vec<String> {
    let mut starts: Vec<usize> = boundary.find_iter(text).map(|m| m.start()).collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            text[start..end].trim().to_string()
        })
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Experience lines, one entry per date boundary.
pub fn format_experience(lines: &[String]) -> Vec<String> {
    split_at_boundaries(&lines.join(" "), &EXPERIENCE_BOUNDARY)
}

/// Skill tokens split on commas, semicolons, bullets and line breaks.
pub fn format_skills(lines: &[String]) -> Vec<String> {
    SKILL_SEPARATOR
        .split(&lines.join("\n"))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Education lines, one entry per degree keyword.
pub fn format_education(lines: &[String]) -> Vec<String> {
    split_at_boundaries(&lines.join(" "), &DEGREE_BOUNDARY)
}

/// Apply the section-specific formatter for `name`.
pub fn format_section(name: SectionName, lines: &[String]) -> FieldValue {
    match name {
        SectionName::Experience => FieldValue::List(format_experience(lines)),
        SectionName::Skills => FieldValue::List(format_skills(lines)),
        SectionName::Education => FieldValue::List(format_education(lines)),
        _ => FieldValue::Text(lines.join("\n")),
    }
}
