//! XML citation exports (EndNote XML, PubMed XML and similar record lists).
//!
//! The document is read into a small element tree with quick-xml, record
//! elements are located, and each record's leaf elements are mapped to
//! entry fields. Inline formatting elements (`<style>`, `<i>`, `<sup>`, ...)
//! contribute their text to the enclosing element.

use quick_xml::Reader;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};

use docsheet_core::{CanonicalField, EntryRecord};

use crate::CitationError;

/// Element names that delimit one citation. The outermost match wins.
const RECORD_ELEMENTS: &[&str] = &[
    "record",
    "pubmedarticle",
    "pubmedbookarticle",
    "reference",
    "citation",
    "entry",
    "article",
    "inproceedings",
    "book",
];

/// Formatting elements whose text belongs to their parent.
const INLINE_ELEMENTS: &[&str] = &["style", "i", "b", "u", "em", "strong", "sup", "sub", "tt"];

/// Subtrees describing cited works or processing dates, not the record.
const SKIPPED_ELEMENTS: &[&str] = &[
    "history",
    "referencelist",
    "datecompleted",
    "daterevised",
];

/// Parents whose `<title>` child names the journal, not the work.
const JOURNAL_PARENTS: &[&str] = &["journal", "periodical"];

#[derive(Debug, Default)]
struct Node {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn lname(&self) -> String {
        self.name.to_lowercase()
    }

    /// Whitespace-collapsed text, inline formatting included.
    fn text_content(&self) -> String {
        self.text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// An open element while reading: a tree node, or inline markup whose text
/// flows into the nearest node below it.
enum Frame {
    Node(Node),
    Inline,
}

fn is_inline(name: &[u8]) -> bool {
    let name = String::from_utf8_lossy(name).to_lowercase();
    INLINE_ELEMENTS.contains(&name.as_str())
}

fn nearest_node(stack: &mut [Frame]) -> Option<&mut Node> {
    stack.iter_mut().rev().find_map(|f| match f {
        Frame::Node(n) => Some(n),
        Frame::Inline => None,
    })
}

fn malformed(reason: impl Into<String>) -> CitationError {
    CitationError::MalformedDocument {
        format: "xml",
        reason: reason.into(),
    }
}

fn start_node(e: &BytesStart<'_>, decoder: Decoder) -> Result<Node, CitationError> {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| malformed(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(|err| malformed(err.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(Node {
        name,
        attrs,
        ..Default::default()
    })
}

/// Read the whole document into a tree rooted at its document element.
fn build_tree(content: &str) -> Result<Node, CitationError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| malformed(format!("{err} at byte {}", reader.error_position())))?;
        match event {
            Event::Start(ref e) => {
                if root.is_some() {
                    return Err(malformed("content after the document element"));
                }
                if !stack.is_empty() && is_inline(e.local_name().as_ref()) {
                    stack.push(Frame::Inline);
                } else {
                    stack.push(Frame::Node(start_node(e, reader.decoder())?));
                }
            }
            Event::Empty(ref e) => {
                if is_inline(e.local_name().as_ref()) {
                    continue;
                }
                let node = start_node(e, reader.decoder())?;
                match nearest_node(&mut stack) {
                    Some(parent) => parent.children.push(node),
                    None if root.is_none() => root = Some(node),
                    None => return Err(malformed("content after the document element")),
                }
            }
            Event::Text(ref e) => {
                let text = e.unescape().map_err(|err| malformed(err.to_string()))?;
                if let Some(node) = nearest_node(&mut stack) {
                    if !node.text.is_empty() {
                        node.text.push(' ');
                    }
                    node.text.push_str(&text);
                }
            }
            Event::CData(ref e) => {
                if let Some(node) = nearest_node(&mut stack) {
                    node.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::End(_) => match stack.pop() {
                Some(Frame::Inline) => {}
                Some(Frame::Node(node)) => match nearest_node(&mut stack) {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                },
                None => return Err(malformed("unbalanced end tag")),
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(malformed("unexpected end of document"));
    }
    root.ok_or_else(|| malformed("no document element"))
}

/// Collect the outermost record elements in document order.
fn find_records<'a>(node: &'a Node, out: &mut Vec<&'a Node>) {
    if RECORD_ELEMENTS.contains(&node.lname().as_str()) {
        out.push(node);
        return;
    }
    for child in &node.children {
        find_records(child, out);
    }
}

/// Canonical field for a leaf element, given the name of its parent.
fn canonical_field(name: &str, parent: Option<&str>) -> Option<CanonicalField> {
    let field = match name {
        "title" if parent.is_some_and(|p| JOURNAL_PARENTS.contains(&p)) => {
            CanonicalField::Journal
        }
        "author" | "creator" => CanonicalField::Authors,
        "title" | "articletitle" => CanonicalField::Title,
        "journal" | "journaltitle" | "secondary-title" | "full-title" | "periodical" => {
            CanonicalField::Journal
        }
        "year" | "pubyear" => CanonicalField::Year,
        "doi" | "electronic-resource-num" => CanonicalField::Doi,
        "volume" => CanonicalField::Volume,
        "issue" | "number" => CanonicalField::Issue,
        "pages" | "medlinepgn" => CanonicalField::Pages,
        "url" => CanonicalField::Url,
        "abstract" | "abstracttext" => CanonicalField::Abstract,
        _ => return None,
    };
    Some(field)
}

/// PubMed-style `<Author><LastName/><ForeName/></Author>` as "Last, Fore".
fn structured_author(node: &Node) -> Option<String> {
    let part = |wanted: &str| {
        node.children
            .iter()
            .find(|c| c.lname() == wanted)
            .map(Node::text_content)
            .filter(|s| !s.is_empty())
    };
    if let Some(last) = part("lastname") {
        return Some(match part("forename").or_else(|| part("initials")) {
            Some(first) => format!("{last}, {first}"),
            None => last,
        });
    }
    if let Some(collective) = part("collectivename") {
        return Some(collective);
    }
    let joined = node
        .children
        .iter()
        .map(Node::text_content)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!joined.is_empty()).then_some(joined)
}

/// Store a mapped value. The first year and DOI win; repeated abstract
/// paragraphs are joined.
fn set_field(record: &mut EntryRecord, field: CanonicalField, value: String) {
    match field {
        CanonicalField::Year | CanonicalField::Doi if record.get(field).is_some() => {}
        CanonicalField::Abstract => {
            let joined = match record.get(field) {
                Some(existing) => format!("{existing} {value}"),
                None => value,
            };
            record.set(field, joined);
        }
        _ => record.set(field, value),
    }
}

fn collect_fields(node: &Node, parent: Option<&str>, record: &mut EntryRecord) {
    let name = node.lname();

    if SKIPPED_ELEMENTS.contains(&name.as_str()) {
        return;
    }

    if name == "author" && !node.is_leaf() {
        if let Some(author) = structured_author(node) {
            record.authors.push(author);
        }
        return;
    }

    if !node.is_leaf() {
        for child in &node.children {
            collect_fields(child, Some(name.as_str()), record);
        }
        return;
    }

    let value = node.text_content();
    if value.is_empty() {
        return;
    }

    // <ArticleId IdType="doi">, <ELocationID EIdType="doi">
    let id_type = node.attr("IdType").or_else(|| node.attr("EIdType"));
    if id_type.is_some_and(|t| t.eq_ignore_ascii_case("doi")) {
        set_field(record, CanonicalField::Doi, value);
        return;
    }

    match canonical_field(&name, parent) {
        Some(field) => set_field(record, field, value),
        None => {
            // Repeated passthrough leaves (keywords, ...) are kept together.
            let merged = match record.extra.get(&node.name) {
                Some(existing) => format!("{existing}; {value}"),
                None => value,
            };
            record.insert_extra(node.name.clone(), merged);
        }
    }
}

fn record_from_node(node: &Node) -> EntryRecord {
    let mut record = EntryRecord::new();
    let name = node.lname();
    for child in &node.children {
        collect_fields(child, Some(name.as_str()), &mut record);
    }
    record
}

/// Parse an XML citation export into entry records.
pub fn parse_xml(content: &str) -> Result<Vec<EntryRecord>, CitationError> {
    let root = build_tree(content)?;

    let mut record_nodes = Vec::new();
    find_records(&root, &mut record_nodes);

    if record_nodes.is_empty() {
        // No known record element: each non-leaf child of the root is a record,
        // or the root itself when it only holds leaves.
        if root.children.iter().any(|c| !c.is_leaf()) {
            record_nodes = root.children.iter().filter(|c| !c.is_leaf()).collect();
        } else {
            record_nodes.push(&root);
        }
    }

    Ok(record_nodes
        .into_iter()
        .map(record_from_node)
        .filter(|r| !r.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDNOTE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xml><records>
  <record>
    <ref-type name="Journal Article">17</ref-type>
    <contributors><authors>
      <author><style face="normal">Doe, John</style></author>
      <author><style face="normal">Roe, Jane</style></author>
    </authors></contributors>
    <titles>
      <title><style face="normal">Parsing &amp; Things</style></title>
      <secondary-title>Journal of Parsing</secondary-title>
    </titles>
    <volume>12</volume>
    <number>3</number>
    <dates><year>2019</year></dates>
    <keywords><keyword>xml</keyword><keyword>citations</keyword></keywords>
  </record>
  <record>
    <titles><title>Second</title></titles>
  </record>
</records></xml>"#;

    #[test]
    fn test_endnote_xml() {
        let records = parse_xml(ENDNOTE).unwrap();
        assert_eq!(records.len(), 2);

        let r = &records[0];
        assert_eq!(r.authors, vec!["Doe, John", "Roe, Jane"]);
        assert_eq!(r.title.as_deref(), Some("Parsing & Things"));
        assert_eq!(r.journal.as_deref(), Some("Journal of Parsing"));
        assert_eq!(r.volume.as_deref(), Some("12"));
        assert_eq!(r.issue.as_deref(), Some("3"));
        assert_eq!(r.year.as_deref(), Some("2019"));
        assert_eq!(r.extra.get("ref-type").map(String::as_str), Some("17"));
        assert_eq!(
            r.extra.get("keyword").map(String::as_str),
            Some("xml; citations")
        );
        assert_eq!(records[1].title.as_deref(), Some("Second"));
    }

    #[test]
    fn test_pubmed_xml() {
        let xml = r#"<PubmedArticleSet>
<PubmedArticle><MedlineCitation><Article>
  <Journal><JournalIssue><Volume>5</Volume><Issue>2</Issue>
    <PubDate><Year>2020</Year></PubDate></JournalIssue>
    <Title>Nature Methods</Title></Journal>
  <ArticleTitle>A <i>novel</i> method</ArticleTitle>
  <Pagination><MedlinePgn>100-110</MedlinePgn></Pagination>
  <ELocationID EIdType="doi">10.1000/xyz</ELocationID>
  <AuthorList>
    <Author><LastName>Smith</LastName><ForeName>Ann</ForeName></Author>
    <Author><LastName>Jones</LastName><Initials>B</Initials></Author>
  </AuthorList>
</Article></MedlineCitation></PubmedArticle>
</PubmedArticleSet>"#;
        let records = parse_xml(xml).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.title.as_deref(), Some("A novel method"));
        assert_eq!(r.journal.as_deref(), Some("Nature Methods"));
        assert_eq!(r.year.as_deref(), Some("2020"));
        assert_eq!(r.volume.as_deref(), Some("5"));
        assert_eq!(r.issue.as_deref(), Some("2"));
        assert_eq!(r.pages.as_deref(), Some("100-110"));
        assert_eq!(r.doi.as_deref(), Some("10.1000/xyz"));
        assert_eq!(r.authors, vec!["Smith, Ann", "Jones, B"]);
    }

    const PUBMED_FULL_RECORD: &str = r#"<PubmedArticleSet>
<PubmedArticle>
  <MedlineCitation Status="MEDLINE">
    <PMID>31000001</PMID>
    <DateCompleted><Year>2021</Year><Month>01</Month></DateCompleted>
    <DateRevised><Year>2022</Year><Month>06</Month></DateRevised>
    <Article>
      <Journal>
        <JournalIssue><Volume>7</Volume>
          <PubDate><Year>2020</Year><Month>Mar</Month></PubDate></JournalIssue>
        <Title>Journal of Methods</Title>
      </Journal>
      <ArticleTitle>Own work</ArticleTitle>
      <ELocationID EIdType="doi">10.1/own</ELocationID>
      <Abstract>
        <AbstractText Label="BACKGROUND">First paragraph.</AbstractText>
        <AbstractText Label="RESULTS">Second paragraph.</AbstractText>
      </Abstract>
    </Article>
  </MedlineCitation>
  <PubmedData>
    <History>
      <PubMedPubDate PubStatus="received"><Year>2019</Year></PubMedPubDate>
    </History>
    <ArticleIdList>
      <ArticleId IdType="pubmed">31000001</ArticleId>
      <ArticleId IdType="doi">10.1/own</ArticleId>
    </ArticleIdList>
    <ReferenceList>
      <Reference><Citation>Someone else</Citation>
        <ArticleIdList><ArticleId IdType="doi">10.9/cited</ArticleId></ArticleIdList>
      </Reference>
    </ReferenceList>
  </PubmedData>
</PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_pubmed_ignores_history_and_references() {
        let records = parse_xml(PUBMED_FULL_RECORD).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.year.as_deref(), Some("2020"));
        assert_eq!(r.doi.as_deref(), Some("10.1/own"));
        assert_eq!(
            r.abstract_text.as_deref(),
            Some("First paragraph. Second paragraph.")
        );
        assert_eq!(r.journal.as_deref(), Some("Journal of Methods"));
        assert_eq!(r.title.as_deref(), Some("Own work"));
    }

    #[test]
    fn test_pubmed_doi_from_article_id_list() {
        let xml = r#"<PubmedArticleSet><PubmedArticle>
  <MedlineCitation><Article><ArticleTitle>No elocation</ArticleTitle></Article></MedlineCitation>
  <PubmedData><ArticleIdList>
    <ArticleId IdType="pubmed">1</ArticleId>
    <ArticleId IdType="doi">10.2/fallback</ArticleId>
  </ArticleIdList></PubmedData>
</PubmedArticle></PubmedArticleSet>"#;
        let records = parse_xml(xml).unwrap();
        assert_eq!(records[0].doi.as_deref(), Some("10.2/fallback"));
    }

    #[test]
    fn test_generic_children_become_records() {
        let xml = "<library><item><title>One</title><isbn>123</isbn></item><item><title>Two</title></item></library>";
        let records = parse_xml(xml).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].extra.get("isbn").map(String::as_str), Some("123"));
        assert_eq!(records[1].title.as_deref(), Some("Two"));
    }

    #[test]
    fn test_flat_root_is_single_record() {
        let records = parse_xml("<ref><title>Only</title><year>2001</year></ref>").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].year.as_deref(), Some("2001"));
    }

    #[test]
    fn test_mismatched_tags_are_malformed() {
        let err = parse_xml("<records><record><title>x</record></records>").unwrap_err();
        assert!(matches!(err, CitationError::MalformedDocument { format: "xml", .. }));
    }

    #[test]
    fn test_unclosed_document_is_malformed() {
        let err = parse_xml("<records><record><title>x</title>").unwrap_err();
        assert!(matches!(err, CitationError::MalformedDocument { format: "xml", .. }));
    }

    #[test]
    fn test_empty_document_is_malformed() {
        assert!(parse_xml("").is_err());
        assert!(parse_xml("not xml at all").is_err());
    }
}
