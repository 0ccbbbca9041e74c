use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::archive::Archive;
use crate::error::LocateError;
use crate::fragment::RawDocumentFragment;
use crate::identifier::PatentNumber;

static FILE_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bfile\s*=\s*"([^"]+)""#).expect("file attribute pattern compiles"));

static PUBLICATION_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)<publication-reference>.*?<country>\s*(\w+)\s*</country>\s*<doc-number>\s*(\w+)\s*</doc-number>\s*(?:<kind>\s*(\w+)\s*</kind>)?",
    )
    .expect("publication reference pattern compiles")
});

pub struct LocatorConfig {
    /// Root element that delimits one document inside a container.
    pub root_element: String,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            root_element: "us-patent-grant".to_string(),
        }
    }
}

/// Finds single documents inside concatenated weekly containers.
///
/// Containers are scanned by delimiter on every call; archive order says
/// nothing about which document sits where.
pub struct ArchiveLocator {
    start_marker: String,
    end_marker: String,
}

impl Default for ArchiveLocator {
    fn default() -> Self {
        Self::new(LocatorConfig::default())
    }
}

impl ArchiveLocator {
    pub fn new(config: LocatorConfig) -> Self {
        Self {
            start_marker: format!("<{}", config.root_element),
            end_marker: format!("</{}>", config.root_element),
        }
    }

    /// Byte spans of every document in the container, in container order.
    pub fn spans<'a>(&'a self, content: &'a str) -> FragmentSpans<'a> {
        FragmentSpans {
            content,
            cursor: 0,
            start_marker: &self.start_marker,
            end_marker: &self.end_marker,
        }
    }

    /// Every fragment whose header carries a recognisable identifier.
    pub fn fragments<'a>(
        &'a self,
        archive: &'a Archive,
    ) -> impl Iterator<Item = RawDocumentFragment> + 'a {
        self.spans(&archive.content).filter_map(move |(start, end)| {
            let text = &archive.content[start..end];
            let identifier = self.identifier_of(text)?;
            Some(RawDocumentFragment::new(
                archive.name.clone(),
                identifier,
                text.to_string(),
                (start, end),
            ))
        })
    }

    /// One linear scan for `target`. The first matching fragment wins; a
    /// duplicate later in the container is reported but not returned.
    pub fn locate(
        &self,
        archive: &Archive,
        target: &PatentNumber,
    ) -> Result<RawDocumentFragment, LocateError> {
        let mut found: Option<RawDocumentFragment> = None;
        let mut scanned = 0usize;

        for (start, end) in self.spans(&archive.content) {
            scanned += 1;
            let text = &archive.content[start..end];
            let Some(identifier) = self.identifier_of(text) else {
                continue;
            };
            if !identifier.matches(target) {
                continue;
            }
            if found.is_some() {
                warn!(
                    identifier = %target,
                    container = %archive.name,
                    offset = start,
                    "duplicate fragment for identifier, keeping the first"
                );
                break;
            }
            found = Some(RawDocumentFragment::new(
                archive.name.clone(),
                identifier,
                text.to_string(),
                (start, end),
            ));
        }

        debug!(
            identifier = %target,
            container = %archive.name,
            fragments_scanned = scanned,
            found = found.is_some(),
            "container scan finished"
        );

        found.ok_or_else(|| LocateError::NotFound {
            identifier: target.to_string(),
            searched: 1,
        })
    }

    /// Build a reusable index so several identifiers can share one scan.
    pub fn index(&self, archive: &Archive) -> ArchiveIndex {
        let mut entries: HashMap<String, Vec<IndexEntry>> = HashMap::new();
        let mut count = 0usize;

        for (start, end) in self.spans(&archive.content) {
            let text = &archive.content[start..end];
            if let Some(identifier) = self.identifier_of(text) {
                count += 1;
                entries.entry(identifier.key()).or_default().push(IndexEntry {
                    identifier,
                    span: (start, end),
                });
            }
        }

        debug!(container = %archive.name, fragments = count, "container indexed");
        ArchiveIndex { entries }
    }

    /// Read the identifier from the root element's `file` attribute, falling
    /// back to the bibliographic publication reference.
    pub fn identifier_of(&self, fragment: &str) -> Option<PatentNumber> {
        let header_end = fragment.find('>').unwrap_or(fragment.len());
        let header = &fragment[..header_end];

        if let Some(caps) = FILE_ATTR.captures(header) {
            if let Ok(id) = PatentNumber::from_file_attribute(&caps[1]) {
                return Some(id);
            }
        }

        let caps = PUBLICATION_ID.captures(fragment)?;
        PatentNumber::from_parts(&caps[1], &caps[2], caps.get(3).map(|m| m.as_str())).ok()
    }
}

/// Iterator over `[start, end)` spans of delimited documents.
///
/// A document without its end marker runs up to the next start marker (or
/// the end of the container) instead of swallowing its neighbours.
pub struct FragmentSpans<'a> {
    content: &'a str,
    cursor: usize,
    start_marker: &'a str,
    end_marker: &'a str,
}

impl<'a> Iterator for FragmentSpans<'a> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let start = find_start(self.content, self.cursor, self.start_marker)?;
        let body = start + self.start_marker.len();
        let next_start = find_start(self.content, body, self.start_marker);

        let end = match self.content[body..].find(self.end_marker) {
            Some(rel) => {
                let end = body + rel + self.end_marker.len();
                match next_start {
                    Some(next) if next < end => next,
                    _ => end,
                }
            }
            None => next_start.unwrap_or(self.content.len()),
        };

        self.cursor = end;
        Some((start, end))
    }
}

/// Position of the next start marker that is followed by whitespace or `>`,
/// so `<us-patent-grant` never matches a longer element name.
fn find_start(content: &str, from: usize, marker: &str) -> Option<usize> {
    let mut from = from;
    while let Some(rel) = content.get(from..)?.find(marker) {
        let pos = from + rel;
        let after = pos + marker.len();
        match content[after..].chars().next() {
            Some(c) if c.is_whitespace() || c == '>' => return Some(pos),
            _ => from = after,
        }
    }
    None
}

#[derive(Debug, Clone)]
struct IndexEntry {
    identifier: PatentNumber,
    span: (usize, usize),
}

/// Identifier → span map produced by one pass over a container.
#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    entries: HashMap<String, Vec<IndexEntry>>,
}

impl ArchiveIndex {
    pub fn lookup(&self, target: &PatentNumber) -> Option<(PatentNumber, (usize, usize))> {
        self.entries
            .get(&target.key())?
            .iter()
            .find(|entry| entry.identifier.matches(target))
            .map(|entry| (entry.identifier.clone(), entry.span))
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEKLY: &str = include_str!("../../../testdata/ipg160712.xml");

    fn archive() -> Archive {
        Archive::new("ipg160712".to_string(), WEEKLY.to_string())
    }

    #[test]
    fn test_spans_cover_every_document() {
        let locator = ArchiveLocator::default();
        let archive = archive();
        let spans: Vec<_> = locator.spans(&archive.content).collect();
        assert_eq!(spans.len(), 4);
        for (start, end) in spans {
            let text = &archive.content[start..end];
            assert!(text.starts_with("<us-patent-grant "));
            assert!(text.ends_with("</us-patent-grant>"));
        }
    }

    #[test]
    fn test_locate_returns_exactly_the_match() {
        let locator = ArchiveLocator::default();
        let archive = archive();
        let target = PatentNumber::parse("US9391881B2").unwrap();

        let fragment = locator.locate(&archive, &target).unwrap();
        assert!(fragment.identifier.matches(&target));
        assert!(fragment.text.contains("<doc-number>09391881</doc-number>"));
        assert!(!fragment.text.contains("09391882"));
        assert_eq!(fragment.container, "ipg160712");
    }

    #[test]
    fn test_locate_is_case_and_punctuation_insensitive() {
        let locator = ArchiveLocator::default();
        let archive = archive();
        let target = PatentNumber::parse("us 9,391,884 b2").unwrap();
        let fragment = locator.locate(&archive, &target).unwrap();
        assert_eq!(fragment.identifier.key(), "US9391884");
    }

    #[test]
    fn test_locate_not_found() {
        let locator = ArchiveLocator::default();
        let archive = archive();
        let target = PatentNumber::parse("US10154005B2").unwrap();
        let err = locator.locate(&archive, &target).unwrap_err();
        assert!(matches!(err, LocateError::NotFound { .. }));
    }

    #[test]
    fn test_every_identifier_resolves_uniquely() {
        let locator = ArchiveLocator::default();
        let archive = archive();
        let fragments: Vec<_> = locator.fragments(&archive).collect();
        assert_eq!(fragments.len(), 4);

        for fragment in &fragments {
            let located = locator.locate(&archive, &fragment.identifier).unwrap();
            assert_eq!(located.offset, fragment.offset);
            let matching = fragments
                .iter()
                .filter(|f| f.identifier.matches(&fragment.identifier))
                .count();
            assert_eq!(matching, 1);
        }
    }

    #[test]
    fn test_truncated_fragment_stops_at_next_start() {
        let content = concat!(
            "<us-patent-grant file=\"US01111111-20160712.XML\"><a>one</a>\n",
            "<us-patent-grant file=\"US02222222-20160712.XML\"><a>two</a></us-patent-grant>\n",
        );
        let archive = Archive::new("broken".to_string(), content.to_string());
        let locator = ArchiveLocator::default();

        let first = locator
            .locate(&archive, &PatentNumber::parse("US1111111").unwrap())
            .unwrap();
        assert!(!first.text.contains("two"));

        let second = locator
            .locate(&archive, &PatentNumber::parse("US2222222").unwrap())
            .unwrap();
        assert!(second.text.ends_with("</us-patent-grant>"));
    }

    #[test]
    fn test_identifier_falls_back_to_publication_reference() {
        let fragment = "<us-patent-grant lang=\"EN\"><publication-reference><document-id>\
            <country>US</country><doc-number>09391881</doc-number><kind>B2</kind>\
            </document-id></publication-reference></us-patent-grant>";
        let id = ArchiveLocator::default().identifier_of(fragment).unwrap();
        assert_eq!(id.to_string(), "US9391881B2");
    }

    #[test]
    fn test_index_matches_linear_scan() {
        let locator = ArchiveLocator::default();
        let archive = archive();
        let index = locator.index(&archive);
        assert_eq!(index.len(), 4);

        let target = PatentNumber::parse("US9391882B1").unwrap();
        let (_, span) = index.lookup(&target).unwrap();
        let scanned = locator.locate(&archive, &target).unwrap();
        assert_eq!(span, scanned.offset);
    }
}
