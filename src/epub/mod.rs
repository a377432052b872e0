//! Reading input EPUBs: container, package document, table of contents.

pub mod container;
pub mod package;
pub mod sniff;
pub mod toc;
pub(crate) mod xml;

pub use container::{EpubArchive, parse_container_xml};
pub use package::{
    ManifestItem, MetadataFields, PackageDocument, PackageMetadata, SourcePackage, SpineItem,
    build_base_opf,
};
pub use sniff::{detect_language, extract_cover, find_cover_item};
pub use toc::{TocEntry, extract_flat_toc, extract_flat_toc_from};
