//! Language and cover detection on input books.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::epub::container::EpubArchive;
use crate::epub::package::{ManifestItem, SourcePackage};

/// Read `dc:language` from the package document of an EPUB.
///
/// Unreadable books and missing or blank languages yield `None`.
pub fn detect_language(path: impl AsRef<Path>) -> Option<String> {
    let path = path.as_ref();
    match EpubArchive::open(path) {
        Ok(epub) => epub.package().language.clone(),
        Err(e) => {
            debug!(path = %path.display(), "cannot detect language: {}", e);
            None
        }
    }
}

/// The declared cover image of a package.
///
/// Prefers the EPUB3 `cover-image` property and falls back to the item named
/// by an EPUB2 `<meta name="cover" content="..."/>`.
pub fn find_cover_item(package: &SourcePackage) -> Option<&ManifestItem> {
    package.cover_image_item().or_else(|| {
        package
            .cover_meta_id
            .as_deref()
            .and_then(|id| package.item(id))
            .filter(|item| item.media_type.starts_with("image/"))
    })
}

/// Copy the cover image of `source` next to `dest`.
///
/// `dest` is the destination without its final extension; the extension is
/// derived from the cover's media type, then its href. Returns the written
/// path, or `None` if the book declares no readable cover.
pub fn extract_cover(source: impl AsRef<Path>, dest: impl AsRef<Path>) -> Option<PathBuf> {
    let source = source.as_ref();
    let dest = dest.as_ref();

    let mut epub = match EpubArchive::open(source) {
        Ok(epub) => epub,
        Err(e) => {
            debug!(path = %source.display(), "cannot open for cover extraction: {}", e);
            return None;
        }
    };

    let item = find_cover_item(epub.package())?.clone();
    let Some(data) = epub.read_package_file(&item.href) else {
        warn!(href = %item.href, "declared cover is missing from the archive");
        return None;
    };

    let final_dest = dest.with_extension(cover_extension(&item));

    if let Some(parent) = final_dest.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!(path = %parent.display(), "cannot create cover directory: {}", e);
        return None;
    }

    match fs::write(&final_dest, data) {
        Ok(()) => {
            debug!(path = %final_dest.display(), "extracted cover");
            Some(final_dest)
        }
        Err(e) => {
            warn!(path = %final_dest.display(), "cannot write cover: {}", e);
            None
        }
    }
}

/// File extension (without the dot) for a cover item.
fn cover_extension(item: &ManifestItem) -> String {
    let media_type = if item.media_type.is_empty() {
        mime_guess::from_path(&item.href)
            .first_raw()
            .unwrap_or("image/jpeg")
    } else {
        item.media_type.as_str()
    };

    let known = match media_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "image/bmp" => Some("bmp"),
        _ => None,
    };

    known
        .or_else(|| {
            mime_guess::get_mime_extensions_str(media_type).and_then(|exts| exts.first().copied())
        })
        .map(str::to_string)
        .or_else(|| {
            Path::new(&item.href)
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "jpg".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(href: &str, media_type: &str) -> ManifestItem {
        ManifestItem::new("cover", href, media_type)
    }

    #[test]
    fn test_cover_extension_from_media_type() {
        assert_eq!(cover_extension(&item("images/c.jpeg", "image/jpeg")), "jpg");
        assert_eq!(cover_extension(&item("images/c", "image/png")), "png");
        assert_eq!(cover_extension(&item("c.svg", "image/svg+xml")), "svg");
    }

    #[test]
    fn test_cover_extension_falls_back_to_href() {
        assert_eq!(cover_extension(&item("c.heic", "application/x-unknown-cover")), "heic");
        assert_eq!(cover_extension(&item("c", "application/x-unknown-cover")), "jpg");
        assert_eq!(cover_extension(&item("c.png", "")), "png");
    }

    #[test]
    fn test_find_cover_item_prefers_property() {
        let opf = r#"<package>
  <metadata><meta name="cover" content="old"/></metadata>
  <manifest>
    <item id="old" href="old.jpg" media-type="image/jpeg"/>
    <item id="new" href="new.png" media-type="image/png" properties="cover-image"/>
  </manifest>
  <spine/>
</package>"#;
        let package = SourcePackage::parse(opf).unwrap();
        assert_eq!(find_cover_item(&package).map(|i| i.id.as_str()), Some("new"));
    }

    #[test]
    fn test_find_cover_item_epub2_meta() {
        let opf = r#"<package>
  <metadata><meta name="cover" content="cov"/></metadata>
  <manifest>
    <item id="cov" href="cover.jpg" media-type="image/jpeg"/>
  </manifest>
  <spine/>
</package>"#;
        let package = SourcePackage::parse(opf).unwrap();
        assert_eq!(find_cover_item(&package).map(|i| i.id.as_str()), Some("cov"));

        let none = SourcePackage::parse("<package><manifest/><spine/></package>").unwrap();
        assert!(find_cover_item(&none).is_none());
    }

    #[test]
    fn test_detect_language_unreadable() {
        assert_eq!(detect_language("/nonexistent/book.epub"), None);
    }
}
