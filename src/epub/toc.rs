//! Flat table-of-contents extraction.
//!
//! Every source book is reduced to one ordered list of `{title, href}`
//! entries, whatever its original nesting:
//!
//! 1. the EPUB3 navigation document (`properties="nav"`),
//! 2. the EPUB2 NCX named by `<spine toc="...">`,
//! 3. the spine itself, with synthesized `Chapter N` titles.
//!
//! Returned hrefs are relative to the package document directory.

use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, warn};

use crate::epub::container::EpubArchive;
use crate::epub::package::ManifestItem;
use crate::epub::xml::{attr, has_token, local_name, resolve_entity};
use crate::error::Result;
use crate::util::{decode_xml, is_external_href, join_path, normalize_path, parent_dir, split_fragment};

/// Title used for anchors and nav points without text.
pub const UNTITLED: &str = "Untitled";

/// One flattened table-of-contents entry. `href` may carry a `#fragment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    pub href: String,
}

impl TocEntry {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
        }
    }
}

/// Extract the flat table of contents of an EPUB file.
///
/// Never fails: unreadable books produce an empty list.
pub fn extract_flat_toc(path: impl AsRef<Path>) -> Vec<TocEntry> {
    let path = path.as_ref();
    match EpubArchive::open(path) {
        Ok(mut epub) => extract_flat_toc_from(&mut epub),
        Err(e) => {
            warn!(path = %path.display(), "cannot read table of contents: {}", e);
            Vec::new()
        }
    }
}

/// Extract the flat table of contents of an opened EPUB.
pub fn extract_flat_toc_from<R: Read + Seek>(epub: &mut EpubArchive<R>) -> Vec<TocEntry> {
    let nav = epub.package().nav_item().cloned();
    let ncx = epub.package().ncx_item().cloned();

    let entries = if let Some(nav) = nav {
        read_toc_document(epub, &nav, parse_nav)
    } else if let Some(ncx) = ncx {
        read_toc_document(epub, &ncx, parse_ncx)
    } else {
        Vec::new()
    };

    if !entries.is_empty() {
        return entries;
    }

    debug!("falling back to spine for table of contents");
    spine_toc(epub)
}

fn read_toc_document<R: Read + Seek>(
    epub: &mut EpubArchive<R>,
    item: &ManifestItem,
    parse: fn(&str) -> Result<Vec<TocEntry>>,
) -> Vec<TocEntry> {
    let Some(bytes) = epub.read_package_file(&item.href) else {
        warn!(href = %item.href, "table of contents document missing");
        return Vec::new();
    };

    match parse(&decode_xml(&bytes)) {
        Ok(entries) => {
            debug!(href = %item.href, count = entries.len(), "parsed table of contents");
            entries
                .into_iter()
                .map(|entry| TocEntry {
                    href: rebase_href(&entry.href, &item.href),
                    title: entry.title,
                })
                .collect()
        }
        Err(e) => {
            warn!(href = %item.href, "cannot parse table of contents: {}", e);
            Vec::new()
        }
    }
}

/// Make an href found in the TOC document at `doc_href` relative to the
/// package directory instead.
fn rebase_href(href: &str, doc_href: &str) -> String {
    if is_external_href(href) {
        return href.to_string();
    }

    let (path, fragment) = split_fragment(href);
    let path = if path.is_empty() {
        doc_href.to_string()
    } else {
        normalize_path(&join_path(parent_dir(doc_href), path))
    };

    match fragment {
        Some(fragment) => format!("{}#{}", path, fragment),
        None => path,
    }
}

fn spine_toc<R: Read + Seek>(epub: &EpubArchive<R>) -> Vec<TocEntry> {
    let package = epub.package();
    package
        .spine
        .iter()
        .enumerate()
        .filter_map(|(i, itemref)| {
            package
                .item(&itemref.idref)
                .filter(|item| !item.href.is_empty())
                .map(|item| TocEntry::new(format!("Chapter {}", i + 1), item.href.clone()))
        })
        .collect()
}

/// Parse an EPUB3 navigation document into a flat list.
///
/// Uses the `<nav>` whose `epub:type` contains `toc`, or the first `<nav>`,
/// and collects every `<a href>` inside it in document order.
pub fn parse_nav(content: &str) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(content);

    struct NavBlock {
        is_toc: bool,
        entries: Vec<TocEntry>,
    }

    struct Anchor {
        href: String,
        text: String,
    }

    let mut blocks: Vec<NavBlock> = Vec::new();
    let mut nav_depth = 0usize;
    let mut anchor: Option<Anchor> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"nav" => {
                    if nav_depth == 0 {
                        let is_toc = attr(&e, b"type").is_some_and(|t| has_token(&t, "toc"));
                        blocks.push(NavBlock {
                            is_toc,
                            entries: Vec::new(),
                        });
                    }
                    nav_depth += 1;
                }
                b"a" if nav_depth > 0 => {
                    anchor = attr(&e, b"href")
                        .filter(|h| !h.is_empty())
                        .map(|href| Anchor {
                            href,
                            text: String::new(),
                        });
                }
                _ => {}
            },
            Event::Empty(e) => {
                if nav_depth > 0
                    && local_name(e.name().as_ref()) == b"a"
                    && let Some(href) = attr(&e, b"href").filter(|h| !h.is_empty())
                    && let Some(block) = blocks.last_mut()
                {
                    block.entries.push(TocEntry::new(UNTITLED, href));
                }
            }
            Event::Text(e) => {
                if let Some(a) = anchor.as_mut() {
                    a.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(e) => {
                if let Some(a) = anchor.as_mut() {
                    a.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if let Some(a) = anchor.as_mut() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        a.text.push_str(&resolved);
                    }
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"nav" if nav_depth > 0 => nav_depth -= 1,
                b"a" => {
                    if let Some(a) = anchor.take()
                        && let Some(block) = blocks.last_mut()
                    {
                        let title = a.text.trim();
                        let title = if title.is_empty() { UNTITLED } else { title };
                        block.entries.push(TocEntry::new(title, a.href));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let index = blocks.iter().position(|b| b.is_toc).unwrap_or(0);
    Ok(if index < blocks.len() {
        blocks.swap_remove(index).entries
    } else {
        Vec::new()
    })
}

struct NavPointState {
    /// Slot in `points` reserved when the navPoint opened.
    slot: usize,
    /// Element depth of the navPoint itself.
    depth: usize,
}

/// Parse an NCX document into a flat list of its `navPoint`s in document order.
pub fn parse_ncx(content: &str) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut points: Vec<(Option<String>, Option<String>)> = Vec::new();
    let mut stack: Vec<NavPointState> = Vec::new();
    let mut depth = 0usize;
    let mut in_text = false;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                match local_name(e.name().as_ref()) {
                    b"navPoint" => {
                        stack.push(NavPointState {
                            slot: points.len(),
                            depth,
                        });
                        points.push((None, None));
                    }
                    b"text" if !stack.is_empty() => {
                        in_text = true;
                        text.clear();
                    }
                    b"content" => set_content_src(&e, depth, &stack, &mut points),
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"content" {
                    set_content_src(&e, depth + 1, &stack, &mut points);
                }
            }
            Event::Text(e) => {
                if in_text {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if in_text {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        text.push_str(&resolved);
                    }
                }
            }
            Event::End(e) => {
                match local_name(e.name().as_ref()) {
                    b"text" if in_text => {
                        in_text = false;
                        if let Some(state) = stack.last() {
                            let title = &mut points[state.slot].0;
                            if title.is_none() {
                                *title = Some(text.trim().to_string());
                            }
                        }
                    }
                    b"navPoint" => {
                        stack.pop();
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(points
        .into_iter()
        .filter_map(|(title, src)| {
            let src = src?;
            let title = title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| UNTITLED.to_string());
            Some(TocEntry::new(title, src))
        })
        .collect())
}

/// Record `content[@src]` when it is a direct child of the innermost navPoint.
fn set_content_src(
    e: &BytesStart<'_>,
    depth: usize,
    stack: &[NavPointState],
    points: &mut [(Option<String>, Option<String>)],
) {
    let Some(state) = stack.last() else {
        return;
    };
    if depth != state.depth + 1 {
        return;
    }
    let src = &mut points[state.slot].1;
    if src.is_none() {
        *src = attr(e, b"src").filter(|s| !s.is_empty());
    }
}
