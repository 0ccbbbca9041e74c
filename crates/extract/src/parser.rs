//! Streaming parser for one grant document.
//!
//! The walk keeps the open-element path so that a `document-id` is read
//! according to where it sits: under `publication-reference` it is the
//! grant itself, under `parent-doc` a priority parent, under
//! `us-references-cited` a citation that is ignored.

use chrono::NaiveDate;
use ingest::{PatentNumber, RawDocumentFragment};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::ParseError;
use crate::schema::{ClaimCategory, ClaimEntry, PatentRecord, RelatedApplication, RelationKind};

const UNKNOWN_IDENTIFIER: &str = "<unknown>";

#[derive(Debug, Default)]
pub struct RecordParser;

impl RecordParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a located fragment. The fragment's header identifier is used to
    /// label failures and must agree with the bibliographic one.
    pub fn parse(&self, fragment: &RawDocumentFragment) -> Result<PatentRecord, ParseError> {
        let record = self.parse_str(&fragment.text, Some(&fragment.identifier))?;
        debug!(
            identifier = %record.identifier,
            container = %fragment.container,
            claims = record.claims.len(),
            related = record.related.len(),
            "record parsed"
        );
        Ok(record)
    }

    pub fn parse_str(
        &self,
        xml: &str,
        expected: Option<&PatentNumber>,
    ) -> Result<PatentRecord, ParseError> {
        let label = expected
            .map(|id| id.to_string())
            .unwrap_or_else(|| UNKNOWN_IDENTIFIER.to_string());

        let mut reader = Reader::from_str(xml);
        let mut draft = Draft::default();

        loop {
            let event = reader.read_event().map_err(|e| ParseError::Invalid {
                identifier: label.clone(),
                reason: format!("XML error at byte {}: {}", reader.buffer_position(), e),
            })?;

            match event {
                Event::Start(e) => {
                    let name = element_name(&e);
                    draft.open(&name, &e);
                    draft.stack.push(name);
                }
                Event::Empty(e) => {
                    let name = element_name(&e);
                    draft.open(&name, &e);
                }
                Event::End(_) => {
                    if let Some(name) = draft.stack.pop() {
                        draft.close(&name);
                    }
                }
                Event::Text(t) => {
                    let text = t
                        .unescape()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    draft.text(&text);
                }
                Event::CData(c) => {
                    let text = String::from_utf8_lossy(&c).into_owned();
                    draft.text(&text);
                }
                Event::Eof => break,
                _ => (),
            }
        }

        draft.finish(expected, &label)
    }
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart, key: &str) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == key.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y%m%d").ok()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Leading digits of `CLM-00012` or `00012`.
fn claim_number(raw: &str) -> Option<u32> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[derive(Debug, Default, Clone)]
struct DocumentId {
    country: String,
    doc_number: String,
    kind: String,
    date: String,
}

impl DocumentId {
    fn set(&mut self, field: &str, text: &str) {
        let target = match field {
            "country" => &mut self.country,
            "doc-number" => &mut self.doc_number,
            "kind" => &mut self.kind,
            "date" => &mut self.date,
            _ => return,
        };
        target.push_str(text.trim());
    }
}

#[derive(Debug, Default)]
struct ClaimDraft {
    number: Option<u32>,
    text: String,
    references: Vec<u32>,
}

#[derive(Debug, Default)]
struct RelatedDraft {
    id: DocumentId,
    grant: DocumentId,
    status: String,
}

#[derive(Debug, Default)]
struct Draft {
    stack: Vec<String>,
    publication: DocumentId,
    application: DocumentId,
    title: String,
    abstract_text: String,
    assignees_seen: usize,
    assignee_org: String,
    assignee_first: String,
    assignee_last: String,
    section: Option<RelationKind>,
    related_draft: Option<RelatedDraft>,
    related: Vec<RelatedApplication>,
    family: BTreeSet<String>,
    claim: Option<ClaimDraft>,
    claims: Vec<ClaimDraft>,
}

impl Draft {
    fn under(&self, ancestor: &str) -> bool {
        self.stack.iter().any(|s| s == ancestor)
    }

    fn leaf(&self) -> &str {
        self.stack.last().map(String::as_str).unwrap_or("")
    }

    /// The element directly below `us-related-documents`, if we are inside one.
    fn related_section(&self) -> Option<&str> {
        let pos = self.stack.iter().position(|s| s == "us-related-documents")?;
        self.stack.get(pos + 1).map(String::as_str)
    }

    fn open(&mut self, name: &str, e: &BytesStart) {
        match name {
            "claim" if self.under("claims") => {
                self.claim = Some(ClaimDraft {
                    number: attribute(e, "num").as_deref().and_then(claim_number),
                    ..ClaimDraft::default()
                });
            }
            "claim-text" | "br" => {
                if let Some(claim) = self.claim.as_mut() {
                    claim.text.push(' ');
                }
            }
            "claim-ref" => {
                if let Some(claim) = self.claim.as_mut() {
                    if let Some(n) = attribute(e, "idref").as_deref().and_then(claim_number) {
                        claim.references.push(n);
                    }
                }
            }
            "p" if self.under("abstract") => self.abstract_text.push(' '),
            "assignee" if self.under("assignees") => self.assignees_seen += 1,
            _ => {}
        }

        if self.leaf() == "us-related-documents" {
            self.section = Some(RelationKind::from_section(name));
            if matches!(name, "us-provisional-application" | "related-publication") {
                self.related_draft = Some(RelatedDraft::default());
            }
        } else if self.related_section().is_some() && matches!(name, "parent-doc" | "child-doc") {
            self.related_draft = Some(RelatedDraft::default());
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(claim) = self.claim.as_mut() {
            claim.text.push_str(text);
            return;
        }
        if self.under("invention-title") {
            self.title.push_str(text);
            return;
        }
        if self.under("abstract") {
            self.abstract_text.push_str(text);
            return;
        }

        let leaf = self.leaf().to_string();

        if self.related_section().is_some() {
            let in_grant = self.under("parent-grant-document");
            let in_pct = self.under("parent-pct-document");
            if let Some(draft) = self.related_draft.as_mut() {
                if leaf == "parent-status" {
                    draft.status.push_str(text.trim());
                } else if in_grant {
                    draft.grant.set(&leaf, text);
                } else if !in_pct {
                    draft.id.set(&leaf, text);
                }
            }
            return;
        }

        if self.under("document-id") {
            if self.under("publication-reference") {
                self.publication.set(&leaf, text);
            } else if self.under("application-reference") {
                self.application.set(&leaf, text);
            }
            return;
        }

        if self.under("assignees") && self.under("addressbook") && self.assignees_seen == 1 {
            match leaf.as_str() {
                "orgname" => self.assignee_org.push_str(text),
                "first-name" => self.assignee_first.push_str(text),
                "last-name" => self.assignee_last.push_str(text),
                _ => {}
            }
        }
    }

    fn close(&mut self, name: &str) {
        match name {
            "claim" => {
                if let Some(claim) = self.claim.take() {
                    self.claims.push(claim);
                }
            }
            "parent-doc" | "child-doc" | "us-provisional-application" | "related-publication" => {
                let relation = if name == "child-doc" {
                    RelationKind::Child
                } else {
                    self.section.unwrap_or(RelationKind::Other)
                };
                if let Some(draft) = self.related_draft.take() {
                    if name == "related-publication" {
                        self.push_family(draft.id);
                    } else {
                        self.push_related(draft, relation);
                    }
                }
            }
            _ => {}
        }

        if self.leaf() == "us-related-documents" {
            self.section = None;
        }
    }

    fn push_related(&mut self, draft: RelatedDraft, relation: RelationKind) {
        if draft.id.doc_number.is_empty() {
            return;
        }
        let country = if draft.id.country.is_empty() {
            "US".to_string()
        } else {
            draft.id.country
        };
        let related = RelatedApplication {
            country,
            application_number: draft.id.doc_number,
            relation,
            filing_date: parse_date(&draft.id.date),
            parent_grant: Some(draft.grant.doc_number).filter(|n| !n.is_empty()),
            status: Some(draft.status).filter(|s| !s.is_empty()),
        };
        if !self.related.contains(&related) {
            self.related.push(related);
        }
    }

    fn push_family(&mut self, id: DocumentId) {
        if id.doc_number.is_empty() {
            return;
        }
        let kind = Some(id.kind.as_str()).filter(|k| !k.is_empty());
        let member = PatentNumber::from_parts(&id.country, &id.doc_number, kind)
            .map(|n| n.to_string())
            .unwrap_or_else(|_| format!("{}{}{}", id.country, id.doc_number, id.kind));
        self.family.insert(member);
    }

    fn finish(
        self,
        expected: Option<&PatentNumber>,
        label: &str,
    ) -> Result<PatentRecord, ParseError> {
        let missing = |field: &'static str| ParseError::MissingField {
            identifier: label.to_string(),
            field,
        };

        let identifier = if self.publication.doc_number.is_empty() {
            expected.cloned().ok_or_else(|| missing("identifier"))?
        } else {
            let kind = Some(self.publication.kind.as_str()).filter(|k| !k.is_empty());
            let country = if self.publication.country.is_empty() {
                "US"
            } else {
                self.publication.country.as_str()
            };
            PatentNumber::from_parts(country, &self.publication.doc_number, kind).map_err(|e| {
                ParseError::Invalid {
                    identifier: label.to_string(),
                    reason: e.to_string(),
                }
            })?
        };

        if let Some(expected) = expected {
            if !identifier.matches(expected) {
                return Err(ParseError::Invalid {
                    identifier: label.to_string(),
                    reason: format!("document declares {identifier}"),
                });
            }
        }
        let identifier = match expected {
            Some(expected) => identifier.with_kind_from(expected),
            None => identifier,
        };
        let label = identifier.to_string();
        let missing = |field: &'static str| ParseError::MissingField {
            identifier: label.clone(),
            field,
        };

        let title = collapse_whitespace(&self.title);
        if title.is_empty() {
            return Err(missing("title"));
        }

        let grant_date = parse_date(&self.publication.date).ok_or_else(|| missing("grant date"))?;

        if self.claims.is_empty() {
            return Err(missing("claims"));
        }

        let filing_date = parse_date(&self.application.date);
        if let Some(filed) = filing_date {
            if grant_date < filed {
                return Err(ParseError::Invalid {
                    identifier: label.clone(),
                    reason: format!("grant date {grant_date} precedes filing date {filed}"),
                });
            }
        }

        let assignee_original = {
            let org = collapse_whitespace(&self.assignee_org);
            let person = collapse_whitespace(&format!("{} {}", self.assignee_first, self.assignee_last));
            if !org.is_empty() {
                Some(org)
            } else if !person.is_empty() {
                Some(person)
            } else {
                None
            }
        };

        let application_number = self.application.doc_number.clone();
        let related = self
            .related
            .into_iter()
            .filter(|r| !(r.relation == RelationKind::Child && r.application_number == application_number))
            .collect();

        let claims = self
            .claims
            .into_iter()
            .enumerate()
            .map(|(i, claim)| ClaimEntry {
                number: claim.number.unwrap_or(i as u32 + 1),
                category: ClaimCategory::Unclassified,
                independent: false,
                text: collapse_whitespace(&claim.text),
                references: claim.references,
            })
            .collect();

        let mut family = self.family;
        family.remove(&identifier.to_string());

        Ok(PatentRecord {
            identifier,
            title,
            abstract_text: collapse_whitespace(&self.abstract_text),
            grant_date,
            filing_date,
            earliest_priority_date: None,
            application_number,
            assignee_original,
            claims,
            related,
            family_members: family,
        })
    }
}
