//! OPF package documents: parsing source packages and synthesizing the merged one.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::epub::xml::{attr, local_name, resolve_entity};
use crate::error::Result;
use crate::util::escape_xml;

/// Separator used to pack several authors or subjects into one field.
pub const LIST_SEPARATOR: &str = "//";

/// Media type of EPUB3 navigation and other XHTML content documents.
pub const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";

/// Media type of EPUB2 NCX documents.
pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// One `<item>` of a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    /// Tokens of the `properties` attribute, in source order.
    pub properties: Vec<String>,
}

impl ManifestItem {
    pub fn new(
        id: impl Into<String>,
        href: impl Into<String>,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
            media_type: media_type.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.properties.push(property.into());
        self
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p == property)
    }

    pub fn remove_property(&mut self, property: &str) {
        self.properties.retain(|p| p != property);
    }

    fn is_ncx(&self) -> bool {
        self.media_type == NCX_MEDIA_TYPE || self.href.to_ascii_lowercase().ends_with(".ncx")
    }
}

/// One `<itemref>` of a spine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub idref: String,
    /// `false` for `linear="no"` items.
    pub linear: bool,
}

impl SpineItem {
    pub fn new(idref: impl Into<String>) -> Self {
        Self {
            idref: idref.into(),
            linear: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Source packages
// ----------------------------------------------------------------------------

/// The parts of an input package document the merger needs.
///
/// Source packages are read-only: the merged output is always a fresh
/// [`PackageDocument`].
#[derive(Debug, Clone, Default)]
pub struct SourcePackage {
    /// First non-empty `dc:language`.
    pub language: Option<String>,
    /// Manifest items in document order.
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    /// Manifest id named by `<spine toc="...">`.
    pub toc_id: Option<String>,
    /// Manifest id named by an EPUB2 `<meta name="cover" content="..."/>`.
    pub cover_meta_id: Option<String>,
}

impl SourcePackage {
    /// Parse an OPF package document.
    pub fn parse(content: &str) -> Result<Self> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut package = SourcePackage::default();
        let mut in_metadata = false;
        let mut in_language = false;
        let mut buf_text = String::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    match local_name(e.name().as_ref()) {
                        b"metadata" => in_metadata = true,
                        b"language" if in_metadata => {
                            in_language = true;
                            buf_text.clear();
                        }
                        b"spine" => package.toc_id = attr(&e, b"toc"),
                        _ => {}
                    }
                    package.handle_leaf(&e);
                }
                Event::Empty(e) => {
                    if local_name(e.name().as_ref()) == b"spine" {
                        package.toc_id = attr(&e, b"toc");
                    }
                    package.handle_leaf(&e);
                }
                Event::Text(e) => {
                    if in_language {
                        buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
                Event::GeneralRef(e) => {
                    if in_language {
                        let entity = String::from_utf8_lossy(e.as_ref());
                        if let Some(resolved) = resolve_entity(&entity) {
                            buf_text.push_str(&resolved);
                        }
                    }
                }
                Event::End(e) => match local_name(e.name().as_ref()) {
                    b"metadata" => in_metadata = false,
                    b"language" if in_language => {
                        in_language = false;
                        let language = buf_text.trim();
                        if package.language.is_none() && !language.is_empty() {
                            package.language = Some(language.to_string());
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(package)
    }

    /// `<item>`, `<itemref>` and `<meta>` may be written empty or with an end tag.
    fn handle_leaf(&mut self, e: &BytesStart<'_>) {
        match local_name(e.name().as_ref()) {
            b"item" => {
                let Some(id) = attr(e, b"id").filter(|id| !id.is_empty()) else {
                    return;
                };
                let href = attr(e, b"href").unwrap_or_default();
                let media_type = attr(e, b"media-type").unwrap_or_else(|| {
                    mime_guess::from_path(&href)
                        .first_raw()
                        .unwrap_or("application/octet-stream")
                        .to_string()
                });
                let properties = attr(e, b"properties")
                    .map(|p| p.split_ascii_whitespace().map(str::to_string).collect())
                    .unwrap_or_default();
                self.manifest.push(ManifestItem {
                    id,
                    href,
                    media_type,
                    properties,
                });
            }
            b"itemref" => {
                if let Some(idref) = attr(e, b"idref") {
                    let linear = attr(e, b"linear").is_none_or(|l| l.trim() != "no");
                    self.spine.push(SpineItem { idref, linear });
                }
            }
            b"meta" => {
                if attr(e, b"name").as_deref() == Some("cover")
                    && let Some(content) = attr(e, b"content").filter(|c| !c.is_empty())
                {
                    self.cover_meta_id = Some(content);
                }
            }
            _ => {}
        }
    }

    /// Look up a manifest item by id.
    pub fn item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }

    /// The EPUB3 navigation document (`properties="nav"`).
    pub fn nav_item(&self) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.has_property("nav"))
    }

    /// The EPUB2 NCX named by the spine's `toc` attribute.
    pub fn ncx_item(&self) -> Option<&ManifestItem> {
        self.toc_id
            .as_deref()
            .and_then(|id| self.item(id))
            .filter(|item| item.is_ncx())
    }

    /// The item flagged `cover-image`.
    pub fn cover_image_item(&self) -> Option<&ManifestItem> {
        self.manifest
            .iter()
            .find(|item| item.has_property("cover-image"))
    }
}

// ----------------------------------------------------------------------------
// Merged package
// ----------------------------------------------------------------------------

/// Caller-supplied metadata for the merged book.
///
/// `author` and `subject` may hold several values separated by `//`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFields {
    pub author: Option<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub published: Option<String>,
    pub isbn: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
}

impl MetadataFields {
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    pub fn with_published(mut self, date: impl Into<String>) -> Self {
        self.published = Some(date.into());
        self
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// `<metadata>` of the merged package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub identifier: String,
    pub title: String,
    pub language: String,
    pub creators: Vec<String>,
    pub subjects: Vec<String>,
    pub publisher: Option<String>,
    pub date: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    /// `dcterms:modified`, `YYYY-MM-DDTHH:MM:SSZ`.
    pub modified: String,
    /// Manifest id referenced by the legacy `<meta name="cover">`.
    pub cover_meta: Option<String>,
}

/// The synthesized package document of the merged book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDocument {
    pub metadata: PackageMetadata,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
}

/// Build the merged package with empty manifest and spine.
///
/// The language falls back to `"en"`; callers resolve detection beforehand.
pub fn build_base_opf(title: &str, fields: &MetadataFields) -> PackageDocument {
    let language = non_empty(&fields.language).unwrap_or("en").to_string();

    PackageDocument {
        metadata: PackageMetadata {
            identifier: format!("urn:uuid:{}", uuid::Uuid::new_v4()),
            title: title.to_string(),
            language,
            creators: split_list(fields.author.as_deref()),
            subjects: split_list(fields.subject.as_deref()),
            publisher: non_empty(&fields.publisher).map(str::to_string),
            date: non_empty(&fields.published).map(str::to_string),
            isbn: non_empty(&fields.isbn).map(str::to_string),
            description: non_empty(&fields.description).map(str::to_string),
            modified: chrono::Utc::now()
                .format("%Y-%m-%dT%H:%M:%SZ")
                .to_string(),
            cover_meta: None,
        },
        manifest: Vec::new(),
        spine: Vec::new(),
    }
}

/// Split a `//`-separated field into trimmed, non-empty values.
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(LIST_SEPARATOR)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl PackageDocument {
    pub fn contains_id(&self, id: &str) -> bool {
        self.manifest.iter().any(|item| item.id == id)
    }

    /// `base`, or `base-2`, `base-3`, ... if the id is already taken.
    pub fn unique_id(&self, base: &str) -> String {
        crate::util::unique_name(base, |id| self.contains_id(id))
    }

    pub fn add_item(&mut self, item: ManifestItem) {
        self.manifest.push(item);
    }

    pub fn remove_item(&mut self, id: &str) -> Option<ManifestItem> {
        let pos = self.manifest.iter().position(|item| item.id == id)?;
        Some(self.manifest.remove(pos))
    }

    /// The item flagged `cover-image`, if any.
    pub fn cover_item(&self) -> Option<&ManifestItem> {
        self.manifest
            .iter()
            .find(|item| item.has_property("cover-image"))
    }

    /// Serialize as an EPUB 3 package document.
    pub fn to_xml(&self) -> String {
        let meta = &self.metadata;
        let mut opf = String::new();

        opf.push_str(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
"#,
        );

        opf.push_str(&format!(
            "    <dc:identifier id=\"BookId\">{}</dc:identifier>\n",
            escape_xml(&meta.identifier)
        ));
        opf.push_str(&format!(
            "    <dc:title>{}</dc:title>\n",
            escape_xml(&meta.title)
        ));
        opf.push_str(&format!(
            "    <dc:language>{}</dc:language>\n",
            escape_xml(&meta.language)
        ));

        for creator in &meta.creators {
            opf.push_str(&format!(
                "    <dc:creator>{}</dc:creator>\n",
                escape_xml(creator)
            ));
        }
        for subject in &meta.subjects {
            opf.push_str(&format!(
                "    <dc:subject>{}</dc:subject>\n",
                escape_xml(subject)
            ));
        }
        if let Some(ref publisher) = meta.publisher {
            opf.push_str(&format!(
                "    <dc:publisher>{}</dc:publisher>\n",
                escape_xml(publisher)
            ));
        }
        if let Some(ref date) = meta.date {
            opf.push_str(&format!("    <dc:date>{}</dc:date>\n", escape_xml(date)));
        }
        if let Some(ref isbn) = meta.isbn {
            opf.push_str(&format!(
                "    <dc:identifier id=\"BookISBN\" opf:scheme=\"ISBN\">{}</dc:identifier>\n",
                escape_xml(isbn)
            ));
        }
        if let Some(ref description) = meta.description {
            opf.push_str(&format!(
                "    <dc:description>{}</dc:description>\n",
                escape_xml(description)
            ));
        }

        opf.push_str(&format!(
            "    <meta property=\"dcterms:modified\">{}</meta>\n",
            escape_xml(&meta.modified)
        ));
        if let Some(ref cover) = meta.cover_meta {
            opf.push_str(&format!(
                "    <meta name=\"cover\" content=\"{}\"/>\n",
                escape_xml(cover)
            ));
        }

        opf.push_str("  </metadata>\n  <manifest>\n");
        for item in &self.manifest {
            opf.push_str(&format!(
                "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"",
                escape_xml(&item.id),
                escape_xml(&item.href),
                escape_xml(&item.media_type)
            ));
            if !item.properties.is_empty() {
                opf.push_str(&format!(
                    " properties=\"{}\"",
                    escape_xml(&item.properties.join(" "))
                ));
            }
            opf.push_str("/>\n");
        }

        opf.push_str("  </manifest>\n  <spine>\n");
        for itemref in &self.spine {
            if itemref.linear {
                opf.push_str(&format!(
                    "    <itemref idref=\"{}\"/>\n",
                    escape_xml(&itemref.idref)
                ));
            } else {
                opf.push_str(&format!(
                    "    <itemref idref=\"{}\" linear=\"no\"/>\n",
                    escape_xml(&itemref.idref)
                ));
            }
        }
        opf.push_str("  </spine>\n</package>\n");
        opf
    }
}
