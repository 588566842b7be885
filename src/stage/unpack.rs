// src/stage/unpack.rs

//! Unpack: extract a product archive.

use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use tracing::info;
use zip::ZipArchive;

use crate::errors::ErrorKind;
use crate::stage::paths::item_dir_name;
use crate::stage::{upstream_path, StageFunction};
use crate::types::{Stage, StageValue};

/// Extracts zip archives into `<extract_root>/<id>/` and returns the
/// archive's first top-level entry (the `.SAFE` directory of a product).
#[derive(Debug, Clone)]
pub struct ZipUnpack {
    extract_root: PathBuf,
}

impl ZipUnpack {
    pub fn new(extract_root: impl Into<PathBuf>) -> Self {
        Self {
            extract_root: extract_root.into(),
        }
    }
}

impl StageFunction for ZipUnpack {
    fn stage(&self) -> Stage {
        Stage::Unpack
    }

    fn run(&self, item: &str, input: &StageValue) -> Result<PathBuf, ErrorKind> {
        let archive_path = upstream_path(Stage::Unpack, input)?;
        let target = self.extract_root.join(item_dir_name(item));

        let root = extract_zip(archive_path, &target)?;
        info!(item, root = %root.display(), "archive extracted");
        Ok(root)
    }
}

fn extract_zip(archive_path: &Path, target: &Path) -> Result<PathBuf, ErrorKind> {
    let corrupt = |what: &str, e: &dyn std::fmt::Display| {
        ErrorKind::CorruptArchive(format!("{what} {}: {e}", archive_path.display()))
    };

    let file = File::open(archive_path).map_err(|e| corrupt("opening", &e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| corrupt("reading", &e))?;

    if archive.is_empty() {
        return Err(ErrorKind::CorruptArchive(format!(
            "{} contains no entries",
            archive_path.display()
        )));
    }

    let first_entry = archive
        .by_index(0)
        .map_err(|e| corrupt("reading first entry of", &e))?
        .enclosed_name()
        .ok_or_else(|| {
            ErrorKind::CorruptArchive(format!(
                "{} has an entry with an unsafe path",
                archive_path.display()
            ))
        })?;

    let top_level = first_entry
        .components()
        .find_map(|c| match c {
            Component::Normal(name) => Some(PathBuf::from(name)),
            _ => None,
        })
        .ok_or_else(|| {
            ErrorKind::CorruptArchive(format!(
                "{} has an empty first entry",
                archive_path.display()
            ))
        })?;

    fs::create_dir_all(target).map_err(|e| corrupt("preparing extraction of", &e))?;
    archive
        .extract(target)
        .map_err(|e| corrupt("extracting", &e))?;

    Ok(target.join(top_level))
}
