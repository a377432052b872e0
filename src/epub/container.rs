//! Opening EPUB archives and locating their package document.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, Write};
use std::path::Path;

use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use tracing::debug;
use zip::ZipArchive;

use crate::epub::package::SourcePackage;
use crate::epub::xml::{attr, local_name};
use crate::error::{Error, Result};
use crate::util::{decode_xml, join_path, parent_dir, percent_decode};

/// Path of the container document inside every EPUB.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Namespace of `META-INF/container.xml`.
pub const CONTAINER_NS: &[u8] = b"urn:oasis:names:tc:opendocument:xmlns:container";

/// Parse META-INF/container.xml to find the OPF path.
///
/// A `rootfile` in the container namespace wins; otherwise the first element
/// whose local name is `rootfile` is used, which tolerates containers with a
/// missing or wrong namespace. Returns `None` for unparsable documents.
pub fn parse_container_xml(bytes: &[u8]) -> Option<String> {
    let content = decode_xml(bytes);
    let mut reader = NsReader::from_str(&content);
    reader.config_mut().trim_text(true);

    let mut lenient: Option<String> = None;

    loop {
        match reader.read_resolved_event() {
            Ok((ns, Event::Empty(e))) | Ok((ns, Event::Start(e)))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                let Some(full_path) = attr(&e, b"full-path").filter(|p| !p.is_empty()) else {
                    continue;
                };
                if matches!(ns, ResolveResult::Bound(ref n) if n.as_ref() == CONTAINER_NS) {
                    return Some(full_path);
                }
                lenient.get_or_insert(full_path);
            }
            Ok((_, Event::Eof)) => break,
            Err(e) => {
                debug!("unparsable container.xml: {}", e);
                break;
            }
            _ => {}
        }
    }

    lenient
}

/// Locate the package document of an opened archive.
///
/// Missing or malformed containers yield `None`.
pub fn locate_package<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Option<String> {
    let bytes = read_zip_entry(archive, CONTAINER_PATH)?;
    parse_container_xml(&bytes)
}

fn read_zip_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Option<Vec<u8>> {
    let index = archive.index_for_name(path)?;
    let mut file = archive.by_index(index).ok()?;
    let mut data = Vec::new();
    file.read_to_end(&mut data).ok()?;
    Some(data)
}

/// An input EPUB with its package document parsed.
///
/// Handles are short-lived: open one per operation and drop it when done.
pub struct EpubArchive<R> {
    archive: ZipArchive<R>,
    package_path: String,
    package_dir: String,
    package: SourcePackage,
}

impl EpubArchive<BufReader<File>> {
    /// Open an EPUB file from disk.
    ///
    /// Fails with [`Error::MissingPackage`] when the container does not
    /// resolve to a readable package document.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file)).map_err(|e| match e {
            Error::InvalidEpub(reason) => {
                debug!(path = %path.display(), "{}", reason);
                Error::MissingPackage {
                    path: path.to_path_buf(),
                }
            }
            other => other,
        })
    }
}

impl<R: Read + Seek> EpubArchive<R> {
    /// Open an EPUB from any seekable reader.
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;

        let package_path = locate_package(&mut archive)
            .ok_or_else(|| Error::InvalidEpub("no rootfile in container.xml".to_string()))?;
        let opf_bytes = read_zip_entry(&mut archive, &package_path).ok_or_else(|| {
            Error::InvalidEpub(format!("package document {} not found", package_path))
        })?;
        let package = SourcePackage::parse(&decode_xml(&opf_bytes))
            .map_err(|e| Error::InvalidEpub(format!("{}: {}", package_path, e)))?;
        let package_dir = parent_dir(&package_path).to_string();

        Ok(Self {
            archive,
            package_path,
            package_dir,
            package,
        })
    }

    /// Archive path of the package document (e.g. `OEBPS/content.opf`).
    pub fn package_path(&self) -> &str {
        &self.package_path
    }

    /// Directory of the package document, `""` at the archive root.
    pub fn package_dir(&self) -> &str {
        &self.package_dir
    }

    pub fn package(&self) -> &SourcePackage {
        &self.package
    }

    /// Index of an archive entry, retrying with the percent-decoded path.
    pub fn entry_index(&self, path: &str) -> Option<usize> {
        self.archive.index_for_name(path).or_else(|| {
            let decoded = percent_decode(path);
            if decoded != path {
                self.archive.index_for_name(&decoded)
            } else {
                None
            }
        })
    }

    /// Read a whole archive entry (verbatim path, then percent-decoded).
    pub fn read_entry(&mut self, path: &str) -> Option<Vec<u8>> {
        let index = self.entry_index(path)?;
        let mut file = self.archive.by_index(index).ok()?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).ok()?;
        Some(data)
    }

    /// Read a file referenced by an href relative to the package document.
    pub fn read_package_file(&mut self, href: &str) -> Option<Vec<u8>> {
        let path = join_path(&self.package_dir, href);
        self.read_entry(&path)
    }

    /// Stream the decompressed bytes of entry `index` into `sink`.
    pub fn copy_entry(&mut self, index: usize, sink: &mut dyn Write) -> io::Result<u64> {
        let mut file = self.archive.by_index(index).map_err(io::Error::other)?;
        io::copy(&mut file, sink)
    }
}
