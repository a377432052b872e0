//! Benchmarks for the merge pipeline.
//!
//! Run with: cargo bench

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use criterion::{Criterion, criterion_group, criterion_main};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use epub_merge::epub::toc::parse_nav;
use epub_merge::{MergeOptions, VolumeRecord, extract_flat_toc, merge_epubs_to_writer};

const CHAPTERS: usize = 40;

fn chapter(n: usize) -> String {
    let paragraphs = "<p>Lorem ipsum dolor sit amet, consectetur adipiscing elit.</p>".repeat(50);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Chapter {n}</title></head>
<body><h1>Chapter {n}</h1>{paragraphs}</body></html>"#
    )
}

fn nav(chapters: usize) -> String {
    let items: String = (1..=chapters)
        .map(|n| format!(r#"<li><a href="text/c{n}.xhtml">Chapter {n}</a></li>"#))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Contents</title></head>
<body><nav epub:type="toc"><ol>{items}</ol></nav></body></html>"#
    )
}

/// A volume with `CHAPTERS` chapters, a stylesheet and a navigation document.
fn sample_volume() -> Vec<u8> {
    let mut manifest = String::from(
        r#"<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
<item id="css" href="style.css" media-type="text/css"/>"#,
    );
    let mut spine = String::new();
    for n in 1..=CHAPTERS {
        manifest.push_str(&format!(
            r#"<item id="c{n}" href="text/c{n}.xhtml" media-type="application/xhtml+xml"/>"#
        ));
        spine.push_str(&format!(r#"<itemref idref="c{n}"/>"#));
    }
    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id">
<metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
<dc:identifier id="id">bench</dc:identifier><dc:title>Bench</dc:title><dc:language>en</dc:language>
</metadata>
<manifest>{manifest}</manifest>
<spine>{spine}</spine>
</package>"#
    );

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default();
    let mut add = |name: &str, data: &[u8], options: SimpleFileOptions| {
        zip.start_file(name, options).unwrap();
        zip.write_all(data).unwrap();
    };

    add("mimetype", b"application/epub+zip", stored);
    add(
        "META-INF/container.xml",
        br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
<rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#,
        deflated,
    );
    add("OEBPS/content.opf", opf.as_bytes(), deflated);
    add("OEBPS/nav.xhtml", nav(CHAPTERS).as_bytes(), deflated);
    add("OEBPS/style.css", b"body { margin: 0 }", deflated);
    for n in 1..=CHAPTERS {
        add(&format!("OEBPS/text/c{n}.xhtml"), chapter(n).as_bytes(), deflated);
    }
    zip.finish().unwrap().into_inner()
}

fn write_volumes(dir: &Path, count: usize) -> Vec<PathBuf> {
    let bytes = sample_volume();
    (1..=count)
        .map(|n| {
            let path = dir.join(format!("vol{n}.epub"));
            std::fs::write(&path, &bytes).unwrap();
            path
        })
        .collect()
}

// ============================================================================
// TOC Benchmarks
// ============================================================================

fn bench_parse_nav(c: &mut Criterion) {
    let doc = nav(500);

    c.bench_function("parse_nav", |b| {
        b.iter(|| parse_nav(&doc).unwrap());
    });
}

fn bench_extract_flat_toc(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let paths = write_volumes(dir.path(), 1);

    c.bench_function("extract_flat_toc", |b| {
        b.iter(|| extract_flat_toc(&paths[0]));
    });
}

// ============================================================================
// Merge Benchmarks
// ============================================================================

fn bench_merge(c: &mut Criterion, name: &str, count: usize, level: u32) {
    let dir = TempDir::new().unwrap();
    let volumes: Vec<VolumeRecord> = write_volumes(dir.path(), count)
        .into_iter()
        .map(VolumeRecord::from_path)
        .collect();
    let options = MergeOptions::new().with_compression_level(level);

    c.bench_function(name, |b| {
        b.iter(|| {
            merge_epubs_to_writer(Cursor::new(Vec::new()), &volumes, &options, "Bench").unwrap()
        });
    });
}

fn bench_merge_three(c: &mut Criterion) {
    bench_merge(c, "merge_3_volumes", 3, 6);
}

fn bench_merge_ten(c: &mut Criterion) {
    bench_merge(c, "merge_10_volumes", 10, 6);
}

fn bench_merge_ten_fast(c: &mut Criterion) {
    bench_merge(c, "merge_10_volumes_level_1", 10, 1);
}

criterion_group!(
    benches,
    // TOC
    bench_parse_nav,
    bench_extract_flat_toc,
    // Merge
    bench_merge_three,
    bench_merge_ten,
    bench_merge_ten_fast,
);
criterion_main!(benches);
