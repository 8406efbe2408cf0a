use once_cell::sync::Lazy;
use regex::Regex;

use docsheet_core::{CanonicalField, EntryRecord};

use crate::CitationError;

/// Parse `.bib` content into entry records.
///
/// Uses the `biblatex` crate for the grammar. If the whole file fails to
/// parse, entries are split on `@type` lines and parsed one by one so a
/// single broken entry does not lose the rest; the file is only rejected
/// when nothing parses.
pub fn parse_bibtex(content: &str) -> Result<Vec<EntryRecord>, CitationError> {
    match biblatex::Bibliography::parse(content) {
        Ok(bibliography) => Ok(bibliography.iter().map(entry_to_record).collect()),
        Err(err) => {
            tracing::debug!(error = %err, "whole-file BibTeX parse failed, retrying per entry");
            parse_entries_individually(content, &err.to_string())
        }
    }
}

fn parse_entries_individually(
    content: &str,
    whole_file_error: &str,
) -> Result<Vec<EntryRecord>, CitationError> {
    static ENTRY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*@[a-zA-Z]").unwrap());

    let positions: Vec<usize> = ENTRY_RE.find_iter(content).map(|m| m.start()).collect();

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (i, &start) in positions.iter().enumerate() {
        let end = positions.get(i + 1).copied().unwrap_or(content.len());
        match biblatex::Bibliography::parse(&content[start..end]) {
            Ok(bib) => records.extend(bib.iter().map(entry_to_record)),
            Err(_) => skipped += 1,
        }
    }

    if records.is_empty() {
        return Err(CitationError::MalformedDocument {
            format: "bibtex",
            reason: whole_file_error.to_string(),
        });
    }
    if skipped > 0 {
        tracing::warn!(skipped, kept = records.len(), "dropped unparseable BibTeX entries");
    }
    Ok(records)
}

/// Canonical field for a BibTeX field name, or `None` for passthrough fields.
fn canonical_field(name: &str) -> Option<CanonicalField> {
    let field = match name {
        "title" => CanonicalField::Title,
        "journal" | "journaltitle" => CanonicalField::Journal,
        "year" => CanonicalField::Year,
        "doi" => CanonicalField::Doi,
        "volume" => CanonicalField::Volume,
        "number" => CanonicalField::Issue,
        "pages" => CanonicalField::Pages,
        "url" => CanonicalField::Url,
        "abstract" => CanonicalField::Abstract,
        _ => return None,
    };
    Some(field)
}

fn entry_to_record(entry: &biblatex::Entry) -> EntryRecord {
    let mut record = EntryRecord::new();
    record.insert_extra("entry_type", entry.entry_type.to_string());
    record.insert_extra("citation_key", entry.key.clone());

    for (name, chunks) in &entry.fields {
        let name = name.to_lowercase();
        if name == "author" {
            continue;
        }
        let value = chunks_to_string(chunks);
        if value.is_empty() {
            continue;
        }
        match canonical_field(&name) {
            Some(field) => record.set(field, value),
            None => record.insert_extra(name, value),
        }
    }

    match entry.author() {
        Ok(people) => {
            record.authors = people
                .iter()
                .filter(|p| p.name != "others")
                .filter(|p| !p.name.is_empty() || !p.given_name.is_empty())
                .map(format_bib_person)
                .collect();
        }
        // Keep an unparseable author list verbatim rather than dropping it.
        Err(_) => {
            if let Some(raw) = entry.fields.get("author").map(|c| chunks_to_string(c))
                && !raw.is_empty()
            {
                record.authors.push(raw);
            }
        }
    }

    record
}

/// Convert biblatex chunks to a plain string.
fn chunks_to_string(chunks: &[biblatex::Spanned<biblatex::Chunk>]) -> String {
    chunks
        .iter()
        .map(|c| match &c.v {
            biblatex::Chunk::Normal(s) => s.as_str(),
            biblatex::Chunk::Verbatim(s) => s.as_str(),
            biblatex::Chunk::Math(s) => s.as_str(),
        })
        .collect::<Vec<_>>()
        .join("")
}

/// Format a biblatex Person as "Given Family" (western name order).
fn format_bib_person(p: &biblatex::Person) -> String {
    [
        p.given_name.as_str(),
        p.prefix.as_str(),
        p.name.as_str(),
        p.suffix.as_str(),
    ]
    .into_iter()
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}
