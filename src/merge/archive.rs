//! The merged output archive.

use std::collections::HashSet;
use std::io::{self, Seek, Write};

use tracing::debug;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::epub::container::CONTAINER_PATH;
use crate::error::Result;
use crate::util::{escape_xml, join_path, parent_dir, percent_decode};

/// Exact content of the `mimetype` entry.
pub const EPUB_MIMETYPE: &[u8] = b"application/epub+zip";

/// Output EPUB being assembled.
///
/// Tracks every written entry so that no destination path is written twice.
pub struct OutputArchive<W: Write + Seek> {
    zip: ZipWriter<W>,
    written: HashSet<String>,
    package_path: String,
    package_dir: String,
    deflated: SimpleFileOptions,
}

impl<W: Write + Seek> OutputArchive<W> {
    /// Start an EPUB whose package document will live at `package_path`.
    ///
    /// Writes `mimetype` (stored) and `META-INF/container.xml` immediately.
    pub fn create(writer: W, package_path: &str, compression_level: u32) -> Result<Self> {
        let mut zip = ZipWriter::new(writer);

        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(compression_level as i64));

        zip.start_file("mimetype", stored)?;
        zip.write_all(EPUB_MIMETYPE)?;

        zip.start_file(CONTAINER_PATH, deflated)?;
        zip.write_all(container_xml(package_path).as_bytes())?;

        let mut written = HashSet::new();
        written.insert("mimetype".to_string());
        written.insert(CONTAINER_PATH.to_string());
        // Reserved until the package document is serialized last
        written.insert(package_path.to_string());

        Ok(Self {
            zip,
            written,
            package_path: package_path.to_string(),
            package_dir: parent_dir(package_path).to_string(),
            deflated,
        })
    }

    /// Directory of the output package document, `""` at the archive root.
    pub fn package_dir(&self) -> &str {
        &self.package_dir
    }

    /// Archive path for an href relative to the output package document.
    ///
    /// Hrefs are URLs, so the entry name is their percent-decoded form.
    pub fn entry_path(&self, href: &str) -> String {
        join_path(&self.package_dir, &percent_decode(href))
    }

    /// Whether an archive path has been written (or reserved).
    pub fn contains(&self, path: &str) -> bool {
        self.written.contains(path)
    }

    /// Whether an href relative to the package document has been written.
    pub fn contains_href(&self, href: &str) -> bool {
        self.contains(&self.entry_path(href))
    }

    /// Write a whole entry. Returns `false` without writing if `path` exists.
    pub fn write_file(&mut self, path: &str, data: &[u8]) -> Result<bool> {
        self.write_from(path, |sink| {
            sink.write_all(data)?;
            Ok(data.len() as u64)
        })
    }

    /// Write an entry whose bytes are produced by `fill`.
    ///
    /// Returns `false` without writing if `path` exists. If `fill` fails the
    /// partial entry is discarded and the error is returned.
    pub fn write_from<F>(&mut self, path: &str, fill: F) -> Result<bool>
    where
        F: FnOnce(&mut dyn Write) -> io::Result<u64>,
    {
        if self.written.contains(path) {
            return Ok(false);
        }

        self.zip.start_file(path, self.deflated)?;
        match fill(&mut self.zip) {
            Ok(bytes) => {
                debug!(path, bytes, "wrote entry");
                self.written.insert(path.to_string());
                Ok(true)
            }
            Err(e) => {
                self.zip.abort_file()?;
                Err(e.into())
            }
        }
    }

    /// Write the package document and close the archive.
    pub fn finish(mut self, package_xml: &str) -> Result<W> {
        self.zip.start_file(self.package_path.as_str(), self.deflated)?;
        self.zip.write_all(package_xml.as_bytes())?;
        Ok(self.zip.finish()?)
    }
}

fn container_xml(package_path: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{}" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
        escape_xml(package_path)
    )
}
