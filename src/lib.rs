//! # epub-merge
//!
//! Merge several EPUB files into one book with a unified three-level table
//! of contents (book, volume, chapter).
//!
//! ## Features
//!
//! - Flattens each input's table of contents from its EPUB3 navigation
//!   document, its EPUB2 NCX, or its spine
//! - Relocates every resource under a per-volume prefix so paths never collide
//! - Synthesizes a fresh EPUB3 package document with merged metadata
//! - Optionally injects or replaces a cover image
//!
//! ## Quick Start
//!
//! ```no_run
//! use epub_merge::{MergeOptions, MetadataFields, VolumeRecord, merge_epubs};
//!
//! let volumes = vec![
//!     VolumeRecord::new("vol1.epub", "The Beginning"),
//!     VolumeRecord::new("vol2.epub", "The Middle")
//!         .with_chapter_titles(vec![None, Some("Interlude".to_string())]),
//! ];
//!
//! let options = MergeOptions::new()
//!     .with_title("The Whole Saga")
//!     .with_metadata(MetadataFields::default().with_author("First Author//Second Author"))
//!     .with_volume_label_template("Vol.{n} {name}");
//!
//! let report = merge_epubs("saga.epub", &volumes, &options).unwrap();
//! for warning in &report.warnings {
//!     eprintln!("warning: {warning}");
//! }
//! ```
//!
//! ## Inspecting Inputs
//!
//! ```no_run
//! use epub_merge::{detect_language, extract_cover, extract_flat_toc};
//!
//! for entry in extract_flat_toc("vol1.epub") {
//!     println!("{} -> {}", entry.title, entry.href);
//! }
//! println!("{:?}", detect_language("vol1.epub"));
//! let cover = extract_cover("vol1.epub", "covers/vol1");
//! ```

pub mod epub;
pub mod error;
pub mod merge;
pub(crate) mod util;

#[cfg(test)]
mod test_helpers;

pub use epub::{
    EpubArchive, ManifestItem, MetadataFields, PackageDocument, SourcePackage, SpineItem,
    TocEntry, build_base_opf, detect_language, extract_cover, extract_flat_toc,
};
pub use error::{Error, Result};
pub use merge::archive::OutputArchive;
pub use merge::cover::{CoverOutcome, apply_cover};
pub use merge::label::format_volume_label;
pub use merge::nav::{ChapterLink, VolumeNode, build_nav};
pub use merge::relocate::HrefMap;
pub use merge::{
    MergeOptions, MergeReport, MergeWarning, VolumeRecord, merge_epubs, merge_epubs_to_writer,
};
