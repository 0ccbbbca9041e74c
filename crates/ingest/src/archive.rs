use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::LocateError;
use crate::fragment::RawDocumentFragment;
use crate::identifier::PatentNumber;
use crate::locator::{ArchiveIndex, ArchiveLocator};

/// One weekly container: many grant documents concatenated in a single file.
#[derive(Debug, Clone)]
pub struct Archive {
    pub name: String,
    pub content: String,
}

impl Archive {
    pub fn new(name: String, content: String) -> Self {
        Self { name, content }
    }

    /// Content fingerprint, used to tell reloaded containers apart.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        hex::encode(&hasher.finalize()[..16])
    }
}

/// Weekly grant containers are named after the grant Tuesday: `ipgYYMMDD`.
pub fn weekly_archive_name(grant_date: NaiveDate) -> String {
    format!("ipg{}", grant_date.format("%y%m%d"))
}

/// Capability handed to the core by the archive-access collaborator.
pub trait FragmentSource {
    /// Every fragment of a named container, in container order.
    fn fragments(&self, container: &str) -> Result<Vec<RawDocumentFragment>, LocateError>;

    /// The single fragment for `target`. `grant_hint` narrows which
    /// container is tried first.
    fn resolve(
        &self,
        target: &PatentNumber,
        grant_hint: Option<NaiveDate>,
    ) -> Result<RawDocumentFragment, LocateError>;
}

/// Ordered, named containers plus lazily-built per-container indexes.
#[derive(Default)]
pub struct ArchiveSet {
    locator: ArchiveLocator,
    archives: Vec<Archive>,
    indexes: Vec<OnceCell<ArchiveIndex>>,
}

impl ArchiveSet {
    pub fn new(locator: ArchiveLocator) -> Self {
        Self {
            locator,
            archives: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn from_archives(archives: Vec<Archive>) -> Self {
        let mut set = Self::default();
        for archive in archives {
            set.push(archive);
        }
        set
    }

    /// Add a container. A container with the same name replaces the old one.
    pub fn push(&mut self, archive: Archive) {
        if let Some(pos) = self.archives.iter().position(|a| a.name == archive.name) {
            self.archives[pos] = archive;
            self.indexes[pos] = OnceCell::new();
        } else {
            self.archives.push(archive);
            self.indexes.push(OnceCell::new());
        }
    }

    pub fn get(&self, name: &str) -> Option<&Archive> {
        self.archives.iter().find(|a| a.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.archives.iter().map(|a| a.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    /// Search order: the hinted weekly container first, then the rest in insertion order.
    fn search_order(&self, grant_hint: Option<NaiveDate>) -> Vec<usize> {
        let hinted = grant_hint
            .map(weekly_archive_name)
            .and_then(|name| self.archives.iter().position(|a| a.name == name));

        let mut order: Vec<usize> = hinted.into_iter().collect();
        order.extend((0..self.archives.len()).filter(|i| Some(*i) != hinted));
        order
    }

    fn index(&self, pos: usize) -> &ArchiveIndex {
        self.indexes[pos].get_or_init(|| self.locator.index(&self.archives[pos]))
    }
}

impl FragmentSource for ArchiveSet {
    fn fragments(&self, container: &str) -> Result<Vec<RawDocumentFragment>, LocateError> {
        let archive = self
            .get(container)
            .ok_or_else(|| LocateError::UnknownContainer(container.to_string()))?;
        Ok(self.locator.fragments(archive).collect())
    }

    fn resolve(
        &self,
        target: &PatentNumber,
        grant_hint: Option<NaiveDate>,
    ) -> Result<RawDocumentFragment, LocateError> {
        let order = self.search_order(grant_hint);

        for &pos in &order {
            if let Some((identifier, (start, end))) = self.index(pos).lookup(target) {
                let archive = &self.archives[pos];
                debug!(identifier = %target, container = %archive.name, "fragment resolved");
                return Ok(RawDocumentFragment::new(
                    archive.name.clone(),
                    identifier,
                    archive.content[start..end].to_string(),
                    (start, end),
                ));
            }
        }

        Err(LocateError::NotFound {
            identifier: target.to_string(),
            searched: order.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEKLY: &str = include_str!("../../../testdata/ipg160712.xml");

    fn other_week() -> Archive {
        Archive::new(
            "ipg160322".to_string(),
            "<us-patent-grant file=\"US09294434-20160322.XML\"><x/></us-patent-grant>".to_string(),
        )
    }

    #[test]
    fn test_weekly_archive_name() {
        let date = NaiveDate::from_ymd_opt(2016, 7, 12).unwrap();
        assert_eq!(weekly_archive_name(date), "ipg160712");
    }

    #[test]
    fn test_resolve_across_containers() {
        let set = ArchiveSet::from_archives(vec![
            other_week(),
            Archive::new("ipg160712".to_string(), WEEKLY.to_string()),
        ]);

        let target = PatentNumber::parse("US9391881B2").unwrap();
        let fragment = set.resolve(&target, None).unwrap();
        assert_eq!(fragment.container, "ipg160712");

        let hinted = set
            .resolve(&target, NaiveDate::from_ymd_opt(2016, 7, 12))
            .unwrap();
        assert_eq!(hinted.offset, fragment.offset);

        let early = PatentNumber::parse("US9294434B1").unwrap();
        assert_eq!(set.resolve(&early, None).unwrap().container, "ipg160322");
    }

    #[test]
    fn test_resolve_not_found_reports_containers_searched() {
        let set = ArchiveSet::from_archives(vec![other_week()]);
        let target = PatentNumber::parse("US9391881B2").unwrap();
        match set.resolve(&target, None) {
            Err(LocateError::NotFound { searched, .. }) => assert_eq!(searched, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_agrees_with_linear_locate() {
        let archive = Archive::new("ipg160712".to_string(), WEEKLY.to_string());
        let locator = ArchiveLocator::default();
        let target = PatentNumber::parse("US9391884B2").unwrap();
        let scanned = locator.locate(&archive, &target).unwrap();

        let set = ArchiveSet::from_archives(vec![archive]);
        let resolved = set.resolve(&target, None).unwrap();
        assert_eq!(resolved.fragment_id, scanned.fragment_id);
    }

    #[test]
    fn test_fragments_of_unknown_container() {
        let set = ArchiveSet::default();
        assert!(matches!(
            set.fragments("ipg000000"),
            Err(LocateError::UnknownContainer(_))
        ));
    }

    #[test]
    fn test_push_replaces_same_name() {
        let mut set = ArchiveSet::default();
        set.push(other_week());
        set.push(Archive::new("ipg160322".to_string(), String::new()));
        assert_eq!(set.len(), 1);
        assert!(set.get("ipg160322").unwrap().content.is_empty());
    }
}
