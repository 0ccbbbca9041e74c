use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

use crate::archive::{Archive, ArchiveSet};

pub struct ArchiveReader;

impl ArchiveReader {
    /// Load one uncompressed weekly container. The archive is named after the file stem.
    pub async fn read_file(path: &Path) -> Result<Archive> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match extension.as_str() {
            "xml" => {
                let bytes = fs::read(path)
                    .await
                    .context(format!("Failed to read archive: {:?}", path))?;
                let content = String::from_utf8_lossy(&bytes).into_owned();
                let name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                Ok(Archive::new(name, content))
            }
            "zip" => anyhow::bail!("Compressed archive must be unpacked first: {:?}", path),
            _ => anyhow::bail!("Unsupported archive format: {}", extension),
        }
    }

    /// Load every `*.xml` container directly inside `dir`, ordered by file name.
    pub async fn read_directory(dir: &Path) -> Result<ArchiveSet> {
        let mut paths: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("xml"))
            })
            .collect();
        paths.sort();

        let mut set = ArchiveSet::default();
        for path in paths {
            let archive = Self::read_file(&path).await?;
            tracing::info!(container = %archive.name, bytes = archive.content.len(), "archive loaded");
            set.push(archive);
        }

        Ok(set)
    }
}
