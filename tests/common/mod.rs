//! Fixture EPUBs built in memory for the integration tests.

#![allow(dead_code)]

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use epub_merge::EpubArchive;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

struct Item {
    id: String,
    href: String,
    media_type: String,
    properties: Option<String>,
}

/// Builder for a small EPUB written to disk.
pub struct FixtureBook {
    opf_path: String,
    language: Option<String>,
    cover_meta: Option<String>,
    items: Vec<Item>,
    spine: Vec<(String, bool)>,
    toc_id: Option<String>,
    files: Vec<(String, Vec<u8>)>,
}

impl FixtureBook {
    pub fn new() -> Self {
        Self {
            opf_path: "OEBPS/content.opf".to_string(),
            language: None,
            cover_meta: None,
            items: Vec::new(),
            spine: Vec::new(),
            toc_id: None,
            files: Vec::new(),
        }
    }

    pub fn opf_path(mut self, path: &str) -> Self {
        self.opf_path = path.to_string();
        self
    }

    pub fn language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    /// Archive path of a file referenced relative to the package document.
    fn package_entry(&self, href: &str) -> String {
        match self.opf_path.rfind('/') {
            Some(i) => format!("{}/{}", &self.opf_path[..i], href),
            None => href.to_string(),
        }
    }

    /// Manifest item only, no file.
    pub fn item(mut self, id: &str, href: &str, media_type: &str, properties: Option<&str>) -> Self {
        self.items.push(Item {
            id: id.to_string(),
            href: href.to_string(),
            media_type: media_type.to_string(),
            properties: properties.map(str::to_string),
        });
        self
    }

    /// Raw archive entry at an absolute archive path.
    pub fn file(mut self, path: &str, data: &[u8]) -> Self {
        self.files.push((path.to_string(), data.to_vec()));
        self
    }

    /// Manifest item plus its file next to the package document.
    pub fn resource(self, id: &str, href: &str, media_type: &str, data: &[u8]) -> Self {
        let entry = self.package_entry(href);
        self.item(id, href, media_type, None).file(&entry, data)
    }

    pub fn spine(mut self, idref: &str) -> Self {
        self.spine.push((idref.to_string(), true));
        self
    }

    pub fn spine_non_linear(mut self, idref: &str) -> Self {
        self.spine.push((idref.to_string(), false));
        self
    }

    /// XHTML chapter in the manifest and spine.
    pub fn chapter(self, id: &str, href: &str) -> Self {
        let body = xhtml(id, &format!("<h1 id=\"top\">{}</h1>", id));
        self.resource(id, href, "application/xhtml+xml", body.as_bytes())
            .spine(id)
    }

    /// EPUB3 navigation document listing `entries` as a flat list.
    pub fn nav(self, href: &str, entries: &[(&str, &str)]) -> Self {
        let items: String = entries
            .iter()
            .map(|(title, target)| format!("<li><a href=\"{}\">{}</a></li>", target, title))
            .collect();
        let body = format!("<nav epub:type=\"toc\"><ol>{}</ol></nav>", items);
        self.nav_document(href, &xhtml("Contents", &body))
    }

    /// EPUB3 navigation document with verbatim content.
    pub fn nav_document(mut self, href: &str, content: &str) -> Self {
        let entry = self.package_entry(href);
        self = self.item("nav", href, "application/xhtml+xml", Some("nav"));
        self.file(&entry, content.as_bytes())
    }

    /// EPUB2 NCX with one navPoint per entry, referenced from the spine.
    pub fn ncx(mut self, href: &str, entries: &[(&str, &str)]) -> Self {
        let points: String = entries
            .iter()
            .enumerate()
            .map(|(i, (title, target))| {
                format!(
                    "<navPoint id=\"p{i}\" playOrder=\"{}\"><navLabel><text>{}</text></navLabel><content src=\"{}\"/></navPoint>",
                    i + 1,
                    title,
                    target
                )
            })
            .collect();
        let ncx = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head/><docTitle><text>Fixture</text></docTitle>
  <navMap>{}</navMap>
</ncx>"#,
            points
        );
        let entry = self.package_entry(href);
        self.toc_id = Some("ncx".to_string());
        self.item("ncx", href, "application/x-dtbncx+xml", None)
            .file(&entry, ncx.as_bytes())
    }

    /// Image flagged `cover-image`.
    pub fn cover(self, id: &str, href: &str, data: &[u8]) -> Self {
        let entry = self.package_entry(href);
        self.item(id, href, "image/jpeg", Some("cover-image"))
            .file(&entry, data)
    }

    /// Image named by an EPUB2 `<meta name="cover">`.
    pub fn legacy_cover(mut self, id: &str, href: &str, data: &[u8]) -> Self {
        self.cover_meta = Some(id.to_string());
        let entry = self.package_entry(href);
        self.item(id, href, "image/png", None).file(&entry, data)
    }

    fn opf(&self) -> String {
        let mut opf = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="id">fixture</dc:identifier>
    <dc:title>Fixture</dc:title>
"#,
        );
        if let Some(ref language) = self.language {
            opf.push_str(&format!("    <dc:language>{}</dc:language>\n", language));
        }
        if let Some(ref cover) = self.cover_meta {
            opf.push_str(&format!("    <meta name=\"cover\" content=\"{}\"/>\n", cover));
        }
        opf.push_str("  </metadata>\n  <manifest>\n");
        for item in &self.items {
            opf.push_str(&format!(
                "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"",
                item.id, item.href, item.media_type
            ));
            if let Some(ref properties) = item.properties {
                opf.push_str(&format!(" properties=\"{}\"", properties));
            }
            opf.push_str("/>\n");
        }
        opf.push_str("  </manifest>\n");
        match self.toc_id {
            Some(ref toc) => opf.push_str(&format!("  <spine toc=\"{}\">\n", toc)),
            None => opf.push_str("  <spine>\n"),
        }
        for (idref, linear) in &self.spine {
            if *linear {
                opf.push_str(&format!("    <itemref idref=\"{}\"/>\n", idref));
            } else {
                opf.push_str(&format!("    <itemref idref=\"{}\" linear=\"no\"/>\n", idref));
            }
        }
        opf.push_str("  </spine>\n</package>\n");
        opf
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default();

        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();
        zip.start_file("META-INF/container.xml", deflated).unwrap();
        zip.write_all(container_xml(&self.opf_path).as_bytes()).unwrap();
        zip.start_file(self.opf_path.as_str(), deflated).unwrap();
        zip.write_all(self.opf().as_bytes()).unwrap();
        for (path, data) in &self.files {
            zip.start_file(path.as_str(), deflated).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    /// Write the EPUB as `dir/name`.
    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.to_bytes()).unwrap();
        path
    }
}

/// A one-chapter book whose chapter is also its navigation document.
pub fn single_chapter_book() -> FixtureBook {
    let content = xhtml(
        "Chapter 1",
        r#"<nav epub:type="toc"><ol><li><a href="c1.xhtml">Chapter 1</a></li></ol></nav><p>Text</p>"#,
    );
    FixtureBook::new()
        .item("c1", "text/c1.xhtml", "application/xhtml+xml", Some("nav"))
        .file("OEBPS/text/c1.xhtml", content.as_bytes())
        .spine("c1")
}

pub fn xhtml(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>{}</title></head>
<body>{}</body>
</html>"#,
        title, body
    )
}

pub fn container_xml(opf_path: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{}" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
        opf_path
    )
}

/// Open a merged output for inspection.
pub fn open_output(path: &Path) -> EpubArchive<BufReader<File>> {
    EpubArchive::open(path).unwrap()
}

/// Names of all archive entries, in archive order.
pub fn entry_names(path: &Path) -> Vec<String> {
    let mut zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
    (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect()
}

pub fn read_entry(path: &Path, name: &str) -> Vec<u8> {
    let mut zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut data = Vec::new();
    zip.by_name(name).unwrap().read_to_end(&mut data).unwrap();
    data
}

/// Content of the merged navigation document.
pub fn nav_document(path: &Path) -> String {
    let mut epub = open_output(path);
    let nav = epub.package().nav_item().unwrap().href.clone();
    String::from_utf8(epub.read_package_file(&nav).unwrap()).unwrap()
}

/// Nesting depth of every `<li>` in a document, in document order.
pub fn li_depths(xhtml: &str) -> Vec<usize> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xhtml);
    let mut depth = 0;
    let mut depths = Vec::new();
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) if e.name().as_ref() == b"li" => {
                depth += 1;
                depths.push(depth);
            }
            Event::End(e) if e.name().as_ref() == b"li" => depth -= 1,
            Event::Eof => break,
            _ => {}
        }
    }
    depths
}
