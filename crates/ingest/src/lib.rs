pub mod archive;
pub mod error;
pub mod fragment;
pub mod identifier;
pub mod locator;
pub mod reader;

pub use archive::{weekly_archive_name, Archive, ArchiveSet, FragmentSource};
pub use error::LocateError;
pub use fragment::RawDocumentFragment;
pub use identifier::PatentNumber;
pub use locator::{ArchiveIndex, ArchiveLocator, LocatorConfig};
pub use reader::ArchiveReader;

use anyhow::Result;
use std::path::Path;

/// Load a directory of weekly containers
pub async fn load_archives(dir_path: &Path) -> Result<ArchiveSet> {
    ArchiveReader::read_directory(dir_path).await
}

/// Locate one identifier in a single container file
pub async fn locate_in_file(file_path: &Path, identifier: &str) -> Result<RawDocumentFragment> {
    let archive = ArchiveReader::read_file(file_path).await?;
    let target = PatentNumber::parse(identifier)?;
    let fragment = ArchiveLocator::default().locate(&archive, &target)?;
    Ok(fragment)
}
