//! Merging several EPUBs into one book.
//!
//! Volumes are folded in caller order into a `MergeState` that owns the
//! output archive, the synthesized package document and the per-volume
//! table-of-contents nodes. Each step borrows it exclusively.

pub mod archive;
pub mod cover;
pub mod label;
pub mod nav;
pub mod relocate;

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::epub::container::EpubArchive;
use crate::epub::package::{
    ManifestItem, MetadataFields, PackageDocument, XHTML_MEDIA_TYPE, build_base_opf,
};
use crate::epub::toc::extract_flat_toc_from;
use crate::error::{Error, Result};
use crate::util::unique_name;

use archive::OutputArchive;
use cover::apply_cover;
use label::format_volume_label;
use nav::{NAV_FILE_NAME, VolumeNode, build_nav};
use relocate::{relocate, volume_toc};

const NAV_ID: &str = "nav-merged";
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// One input book of a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRecord {
    pub path: PathBuf,
    /// Display name, available to label templates as `{name}`.
    pub alias: String,
    /// Per-chapter title overrides, indexed like the flattened table of
    /// contents. `None` entries keep the extracted title.
    pub chapter_titles: Option<Vec<Option<String>>>,
}

impl VolumeRecord {
    pub fn new(path: impl Into<PathBuf>, alias: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            alias: alias.into(),
            chapter_titles: None,
        }
    }

    /// A volume named after its file stem.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let alias = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(path, alias)
    }

    pub fn with_chapter_titles(mut self, titles: Vec<Option<String>>) -> Self {
        self.chapter_titles = Some(titles);
        self
    }
}

/// Settings for a merge.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Title of the merged book (default: output file stem).
    pub title: Option<String>,
    pub metadata: MetadataFields,
    /// Volume label with `{n}` and `{name}` placeholders.
    pub volume_label_template: Option<String>,
    pub cover: Option<PathBuf>,
    /// Replace a cover carried over from the first volume.
    pub replace_cover: bool,
    /// Deflate level for content entries (0-9, default 6).
    pub compression_level: Option<u32>,
}

impl MergeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_metadata(mut self, metadata: MetadataFields) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_volume_label_template(mut self, template: impl Into<String>) -> Self {
        self.volume_label_template = Some(template.into());
        self
    }

    pub fn with_cover(mut self, cover: impl Into<PathBuf>) -> Self {
        self.cover = Some(cover.into());
        self
    }

    pub fn with_replace_cover(mut self, replace: bool) -> Self {
        self.replace_cover = replace;
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = Some(level.min(9));
        self
    }
}

/// A problem that cost part of the output but did not abort the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(tag = "kind", rename_all = "snake_case"))]
pub enum MergeWarning {
    /// A manifest item whose file is absent from its source archive.
    MissingResource { volume: usize, href: String },
    /// A table-of-contents entry whose target is not in the output.
    UnresolvedTocEntry {
        volume: usize,
        title: String,
        href: String,
    },
    /// A volume contributed no chapter links.
    EmptyToc { volume: usize },
    /// A later volume's `cover-image` flag was dropped.
    DuplicateCover { volume: usize, id: String },
}

impl fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeWarning::MissingResource { volume, href } => {
                write!(f, "volume {}: resource {} not found", volume + 1, href)
            }
            MergeWarning::UnresolvedTocEntry {
                volume,
                title,
                href,
            } => write!(
                f,
                "volume {}: table of contents entry {:?} ({}) has no target",
                volume + 1,
                title,
                href
            ),
            MergeWarning::EmptyToc { volume } => {
                write!(f, "volume {}: empty table of contents", volume + 1)
            }
            MergeWarning::DuplicateCover { volume, id } => {
                write!(f, "volume {}: ignoring second cover image {}", volume + 1, id)
            }
        }
    }
}

/// Summary of a completed merge.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct MergeReport {
    /// Items in the merged manifest, navigation document included.
    pub manifest_items: usize,
    pub spine_items: usize,
    pub volumes: usize,
    pub warnings: Vec<MergeWarning>,
}

impl MergeReport {
    pub fn manifest_items(&self) -> usize {
        self.manifest_items
    }
}

/// Accumulated output of a merge in progress.
pub(crate) struct MergeState<W: Write + Seek> {
    pub(crate) archive: OutputArchive<W>,
    pub(crate) package: PackageDocument,
    pub(crate) volumes: Vec<VolumeNode>,
    pub(crate) warnings: Vec<MergeWarning>,
}

/// Merge `volumes` into a new EPUB at `output`.
///
/// The parent directory of `output` is created if needed. The title defaults
/// to the file stem of `output`.
///
/// # Example
///
/// ```no_run
/// use epub_merge::{MergeOptions, VolumeRecord, merge_epubs};
///
/// let volumes = [
///     VolumeRecord::from_path("vol1.epub"),
///     VolumeRecord::from_path("vol2.epub"),
/// ];
/// let report = merge_epubs("saga.epub", &volumes, &MergeOptions::new())?;
/// println!("{} manifest items", report.manifest_items());
/// # Ok::<(), epub_merge::Error>(())
/// ```
pub fn merge_epubs(
    output: impl AsRef<Path>,
    volumes: &[VolumeRecord],
    options: &MergeOptions,
) -> Result<MergeReport> {
    let output = output.as_ref();

    if volumes.is_empty() {
        return Err(Error::NoInputVolumes);
    }
    if let Some(cover) = options.cover.as_deref()
        && !cover.exists()
    {
        return Err(Error::MissingCoverFile(cover.to_path_buf()));
    }

    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| Error::OutputDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let default_title = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file = File::create(output)?;
    merge_epubs_to_writer(BufWriter::new(file), volumes, options, &default_title)
}

/// Merge `volumes` into any seekable writer.
///
/// `default_title` is used when `options` carries no title.
pub fn merge_epubs_to_writer<W: Write + Seek>(
    writer: W,
    volumes: &[VolumeRecord],
    options: &MergeOptions,
    default_title: &str,
) -> Result<MergeReport> {
    let Some(first) = volumes.first() else {
        return Err(Error::NoInputVolumes);
    };

    // The first volume fixes the package path and the fallback language
    let (package_path, detected_language) = {
        let epub = EpubArchive::open(&first.path)?;
        (
            epub.package_path().to_string(),
            epub.package().language.clone(),
        )
    };

    let language = non_empty(options.metadata.language.as_deref())
        .map(str::to_string)
        .or(detected_language)
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
    let title = non_empty(options.title.as_deref()).unwrap_or(default_title);

    let mut fields = options.metadata.clone();
    fields.language = Some(language.clone());

    let archive = OutputArchive::create(
        writer,
        &package_path,
        options
            .compression_level
            .unwrap_or(DEFAULT_COMPRESSION_LEVEL),
    )?;
    let mut state = MergeState {
        archive,
        package: build_base_opf(title, &fields),
        volumes: Vec::with_capacity(volumes.len()),
        warnings: Vec::new(),
    };

    for (index, volume) in volumes.iter().enumerate() {
        info!(volume = index, path = %volume.path.display(), "merging volume");

        let mut source = EpubArchive::open(&volume.path)?;
        let toc = extract_flat_toc_from(&mut source);
        let map = relocate(index, &mut source, &mut state)?;

        let label = format_volume_label(
            index,
            &volume.alias,
            Some(language.as_str()),
            options.volume_label_template.as_deref(),
        );
        let node = volume_toc(
            index,
            label,
            &toc,
            volume.chapter_titles.as_deref(),
            &map,
            &mut state,
        );
        debug!(volume = index, chapters = node.chapters.len(), "built volume node");
        state.volumes.push(node);
    }

    if let Some(cover) = options.cover.as_deref() {
        apply_cover(
            &mut state.archive,
            &mut state.package,
            cover,
            options.replace_cover,
        )?;
    }

    write_nav(&mut state, title)?;

    let MergeState {
        archive,
        package,
        warnings,
        ..
    } = state;

    let report = MergeReport {
        manifest_items: package.manifest.len(),
        spine_items: package.spine.len(),
        volumes: volumes.len(),
        warnings,
    };

    let mut writer = archive.finish(&package.to_xml())?;
    writer.flush()?;

    info!(
        manifest_items = report.manifest_items,
        spine_items = report.spine_items,
        warnings = report.warnings.len(),
        "merge complete"
    );
    Ok(report)
}

/// Write the navigation document and register it in the manifest.
fn write_nav<W: Write + Seek>(state: &mut MergeState<W>, title: &str) -> Result<()> {
    let book_href = state
        .volumes
        .first()
        .map(|v| v.href.as_str())
        .unwrap_or("#");
    let nav = build_nav(title, book_href, &state.volumes);

    let href = unique_name(NAV_FILE_NAME, |name| {
        state.archive.contains_href(name)
            || state.package.manifest.iter().any(|item| item.href == name)
    });
    let dest = state.archive.entry_path(&href);
    state.archive.write_file(&dest, &nav)?;

    let id = state.package.unique_id(NAV_ID);
    debug!(href = %href, id = %id, "wrote navigation document");
    state
        .package
        .add_item(ManifestItem::new(id, href, XHTML_MEDIA_TYPE).with_property("nav"));
    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
