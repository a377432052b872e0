//! Copying one volume's resources into the merged book.
//!
//! Volume 0 keeps its hrefs and ids. Volume `i > 0` is moved under `v{i}/`
//! and its manifest ids get a `v{i}_` prefix. When an earlier volume already
//! owns one of those paths or ids (volume 0 may ship its own `v1/` folder),
//! the volume moves to `v{i}-2/` and `v{i}-2_`, then `-3`, and so on.

use std::collections::HashMap;
use std::io::{Read, Seek, Write};

use tracing::{debug, warn};

use crate::epub::container::EpubArchive;
use crate::epub::package::{ManifestItem, SpineItem};
use crate::epub::toc::TocEntry;
use crate::error::{Error, Result};
use crate::merge::nav::{ChapterLink, VolumeNode};
use crate::merge::{MergeState, MergeWarning};
use crate::util::{join_path, percent_decode, split_fragment, unique_name};

/// Maps source hrefs of one volume to their hrefs in the merged book.
///
/// Both the href as written in the source manifest and its percent-decoded
/// form are recorded.
#[derive(Debug, Clone, Default)]
pub struct HrefMap {
    map: HashMap<String, String>,
}

impl HrefMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, old: &str, new: &str) {
        let decoded = percent_decode(old);
        if decoded != old {
            self.map.insert(decoded.into_owned(), new.to_string());
        }
        self.map.insert(old.to_string(), new.to_string());
    }

    /// Look up an href (without fragment), retrying its percent-decoded form.
    pub fn resolve(&self, href: &str) -> Option<&str> {
        self.map
            .get(href)
            .or_else(|| self.map.get(percent_decode(href).as_ref()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Href prefix and id prefix for volume `index`.
pub fn volume_prefixes(index: usize) -> (String, String) {
    if index == 0 {
        (String::new(), String::new())
    } else {
        (format!("v{}/", index), format!("v{}_", index))
    }
}

/// Prefixes for volume `index` that clash with nothing an earlier volume wrote.
fn free_prefixes<W: Write + Seek>(
    index: usize,
    manifest: &[ManifestItem],
    state: &MergeState<W>,
) -> (String, String) {
    let base = volume_prefixes(index);
    if !prefixes_clash(&base, manifest, state) {
        return base;
    }

    let stem = unique_name(&format!("v{}", index), |stem| {
        prefixes_clash(&(format!("{}/", stem), format!("{}_", stem)), manifest, state)
    });
    warn!(volume = index, prefix = %stem, "volume paths clash with an earlier volume");
    (format!("{}/", stem), format!("{}_", stem))
}

fn prefixes_clash<W: Write + Seek>(
    (href_prefix, id_prefix): &(String, String),
    manifest: &[ManifestItem],
    state: &MergeState<W>,
) -> bool {
    manifest
        .iter()
        .filter(|item| !item.href.is_empty())
        .any(|item| {
            let href = format!("{}{}", href_prefix, item.href);
            state.archive.contains(&state.archive.entry_path(&href))
                || state.package.manifest.iter().any(|m| m.href == href)
                || state.package.contains_id(&format!("{}{}", id_prefix, item.id))
        })
}

/// Copy every manifest resource of `source` into the output and append its
/// manifest items and spine to the merged package.
///
/// Resources missing from the source archive are recorded as warnings; their
/// manifest entries are still registered.
pub(crate) fn relocate<R, W>(
    index: usize,
    source: &mut EpubArchive<R>,
    state: &mut MergeState<W>,
) -> Result<HrefMap>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let manifest = source.package().manifest.clone();
    let spine = source.package().spine.clone();
    let (href_prefix, id_prefix) = free_prefixes(index, &manifest, state);
    let mut map = HrefMap::new();

    for item in manifest {
        if item.href.is_empty() {
            continue;
        }

        let new_href = format!("{}{}", href_prefix, item.href);
        map.insert(&item.href, &new_href);

        let dest = state.archive.entry_path(&new_href);
        if !state.archive.contains(&dest) {
            copy_resource(index, source, &item.href, &dest, state)?;
        }

        let mut relocated = ManifestItem {
            id: format!("{}{}", id_prefix, item.id),
            href: new_href,
            media_type: item.media_type,
            properties: item.properties,
        };
        relocated.remove_property("nav");

        if relocated.has_property("cover-image") {
            if state.package.cover_item().is_some() {
                relocated.remove_property("cover-image");
                state.warnings.push(MergeWarning::DuplicateCover {
                    volume: index,
                    id: relocated.id.clone(),
                });
            } else {
                state.package.metadata.cover_meta = Some(relocated.id.clone());
            }
        }

        state.package.add_item(relocated);
    }

    state
        .package
        .spine
        .extend(spine.into_iter().map(|itemref| SpineItem {
            idref: format!("{}{}", id_prefix, itemref.idref),
            linear: itemref.linear,
        }));

    debug!(volume = index, hrefs = map.len(), "relocated resources");
    Ok(map)
}

fn copy_resource<R, W>(
    index: usize,
    source: &mut EpubArchive<R>,
    href: &str,
    dest: &str,
    state: &mut MergeState<W>,
) -> Result<()>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let source_path = join_path(source.package_dir(), href);
    let Some(entry) = source.entry_index(&source_path) else {
        warn!(volume = index, href, "resource missing from source archive");
        state.warnings.push(MergeWarning::MissingResource {
            volume: index,
            href: href.to_string(),
        });
        return Ok(());
    };

    match state
        .archive
        .write_from(dest, |sink| source.copy_entry(entry, sink))
    {
        Ok(_) => Ok(()),
        // Read failures on a single source entry only cost that resource
        Err(Error::Io(e)) => {
            warn!(volume = index, href, "cannot copy resource: {}", e);
            state.warnings.push(MergeWarning::MissingResource {
                volume: index,
                href: href.to_string(),
            });
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Build the volume node of the merged table of contents.
///
/// `renames[i]`, when present, replaces the title of `toc[i]`. Entries whose
/// target was not written to the output are dropped with a warning.
pub(crate) fn volume_toc<W: Write + Seek>(
    index: usize,
    label: String,
    toc: &[TocEntry],
    renames: Option<&[Option<String>]>,
    map: &HrefMap,
    state: &mut MergeState<W>,
) -> VolumeNode {
    if toc.is_empty() {
        warn!(volume = index, "volume has no table of contents");
        state.warnings.push(MergeWarning::EmptyToc { volume: index });
    }

    let mut chapters = Vec::with_capacity(toc.len());

    for (i, entry) in toc.iter().enumerate() {
        let title = renames
            .and_then(|r| r.get(i))
            .and_then(|t| t.clone())
            .unwrap_or_else(|| entry.title.clone());

        let (path, fragment) = split_fragment(&entry.href);
        let target = map
            .resolve(path)
            .filter(|new| state.archive.contains_href(new));

        let Some(target) = target else {
            warn!(volume = index, href = %entry.href, "dropping unresolved table of contents entry");
            state.warnings.push(MergeWarning::UnresolvedTocEntry {
                volume: index,
                title,
                href: entry.href.clone(),
            });
            continue;
        };

        let href = match fragment {
            Some(fragment) if !fragment.is_empty() => format!("{}#{}", target, fragment),
            _ => target.to_string(),
        };
        chapters.push(ChapterLink { title, href });
    }

    let href = chapters
        .first()
        .map(|c| split_fragment(&c.href).0.to_string())
        .unwrap_or_else(|| "#".to_string());

    VolumeNode {
        label,
        href,
        chapters,
    }
}
