//! Navigation document for the merged book.
//!
//! The table of contents always has three levels:
//!
//! ```text
//! Book title
//!   Volume label
//!     Chapter title
//! ```

use crate::util::escape_xml;

/// Preferred file name of the merged navigation document.
pub const NAV_FILE_NAME: &str = "nav-merged.xhtml";

/// A chapter link, href relative to the output package document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterLink {
    pub title: String,
    pub href: String,
}

/// One volume of the merged table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeNode {
    pub label: String,
    /// First chapter of the volume, or `#`.
    pub href: String,
    pub chapters: Vec<ChapterLink>,
}

/// Build the XHTML navigation document.
pub fn build_nav(book_title: &str, book_href: &str, volumes: &[VolumeNode]) -> Vec<u8> {
    let mut nav = String::new();

    nav.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head>
"#,
    );
    nav.push_str(&format!("  <title>{}</title>\n", escape_xml(book_title)));
    nav.push_str("  <style>ol { list-style: none; } a { text-decoration: none; }</style>\n");
    nav.push_str("</head>\n<body>\n");
    nav.push_str("  <nav epub:type=\"toc\" id=\"toc\">\n");
    nav.push_str("    <ol>\n");
    nav.push_str("      <li>\n");
    push_anchor(&mut nav, 8, book_href, book_title);

    if !volumes.is_empty() {
        nav.push_str("        <ol>\n");
        for volume in volumes {
            write_volume(&mut nav, volume);
        }
        nav.push_str("        </ol>\n");
    }

    nav.push_str("      </li>\n");
    nav.push_str("    </ol>\n");
    nav.push_str("  </nav>\n");
    nav.push_str("</body>\n</html>\n");

    nav.into_bytes()
}

fn write_volume(nav: &mut String, volume: &VolumeNode) {
    nav.push_str("          <li>\n");
    push_anchor(nav, 12, &volume.href, &volume.label);

    if !volume.chapters.is_empty() {
        nav.push_str("            <ol>\n");
        for chapter in &volume.chapters {
            nav.push_str("              <li>");
            nav.push_str(&anchor(&chapter.href, &chapter.title));
            nav.push_str("</li>\n");
        }
        nav.push_str("            </ol>\n");
    }

    nav.push_str("          </li>\n");
}

fn push_anchor(nav: &mut String, indent: usize, href: &str, text: &str) {
    nav.push_str(&" ".repeat(indent));
    nav.push_str(&anchor(href, text));
    nav.push('\n');
}

fn anchor(href: &str, text: &str) -> String {
    format!("<a href=\"{}\">{}</a>", escape_xml(href), escape_xml(text))
}
