//! Cover injection into the merged package.

use std::fs;
use std::io::{Seek, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::epub::package::{ManifestItem, PackageDocument};
use crate::error::{Error, Result};
use crate::merge::archive::OutputArchive;
use crate::util::unique_name;

const COVER_ID: &str = "cover-image";
const DEFAULT_COVER_EXTENSION: &str = "jpg";
const DEFAULT_COVER_MEDIA_TYPE: &str = "image/jpeg";

/// What [`apply_cover`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverOutcome {
    /// An existing cover was left in place.
    Kept { id: String },
    /// A cover was written and registered.
    Applied { id: String, href: String },
}

/// Register `cover_path` as the cover of the merged book.
///
/// With `replace == false` an existing `cover-image` item is left alone.
/// With `replace == true` it is removed from the manifest first (its file
/// stays in the archive). The image is written as `cover.{ext}` next to the
/// package document and becomes the target of `<meta name="cover">`.
pub fn apply_cover<W: Write + Seek>(
    archive: &mut OutputArchive<W>,
    package: &mut PackageDocument,
    cover_path: &Path,
    replace: bool,
) -> Result<CoverOutcome> {
    if !cover_path.exists() {
        return Err(Error::MissingCoverFile(cover_path.to_path_buf()));
    }

    if let Some(existing) = package.cover_item() {
        let id = existing.id.clone();
        if !replace {
            debug!(id = %id, "keeping existing cover");
            return Ok(CoverOutcome::Kept { id });
        }
        debug!(id = %id, "replacing existing cover");
        package.remove_item(&id);
    }

    let data = fs::read(cover_path)?;

    let extension = cover_path
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .unwrap_or(DEFAULT_COVER_EXTENSION);
    let href = unique_name(&format!("cover.{}", extension), |name| {
        archive.contains_href(name) || package.manifest.iter().any(|item| item.href == name)
    });
    let media_type = mime_guess::from_path(cover_path)
        .first_raw()
        .unwrap_or(DEFAULT_COVER_MEDIA_TYPE);

    let dest = archive.entry_path(&href);
    archive.write_file(&dest, &data)?;

    let id = package.unique_id(COVER_ID);
    package.add_item(ManifestItem::new(&id, &href, media_type).with_property("cover-image"));
    package.metadata.cover_meta = Some(id.clone());

    info!(href = %href, "applied cover");
    Ok(CoverOutcome::Applied { id, href })
}
