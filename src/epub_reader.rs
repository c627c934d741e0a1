use crate::markup;
use crate::reader::{DocumentDecoder, DocumentInfo, DocumentKind};
use anyhow::{Context, Result};
use rbook::prelude::*;
use rbook::Epub;
use std::io::Cursor;

/// An opened EPUB whose units are the spine entries in reading order.
pub struct EpubDocument {
    epub: Epub,
    chapters: usize,
}

impl EpubDocument {
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let epub = Epub::options()
            .strict(false)
            .read(Cursor::new(bytes))
            .context("Failed to open EPUB")?;
        let chapters = epub.reader().len();
        Ok(Self { epub, chapters })
    }

    fn title(&self) -> Option<String> {
        self.epub
            .metadata()
            .title()
            .map(|t| t.value().to_string())
    }

    fn authors(&self) -> Vec<String> {
        let mut authors = Vec::new();
        for creator in self.epub.metadata().creators() {
            authors.push(creator.value().to_string());
        }
        authors
    }
}

impl DocumentDecoder for EpubDocument {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Epub
    }

    fn unit_count(&self) -> usize {
        self.chapters
    }

    fn decode_unit(&mut self, index: usize) -> Result<String> {
        let mut reader = self.epub.reader();
        let data = reader
            .read(index)
            .with_context(|| format!("Failed to read chapter {}", index + 1))?;
        markup::strip_markup(data.content())
            .with_context(|| format!("Failed to flatten chapter {}", index + 1))
    }

    fn info(&self) -> DocumentInfo {
        DocumentInfo {
            title: self.title(),
            authors: self.authors(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{extract, ExtractOptions};
    use crate::tokenizer::tokenize_block;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    // Manifest lists c1, c2, c3; the spine reads c1, c3, a chapter whose file
    // is absent from the archive, then c2.
    const PACKAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:uuid:6a1f0c2e-0000-4000-8000-000000000001</dc:identifier>
    <dc:title>Spine Order</dc:title>
    <dc:creator>Ann Writer</dc:creator>
    <dc:language>en</dc:language>
    <meta property="dcterms:modified">2024-01-01T00:00:00Z</meta>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="c1" href="c1.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="c2.xhtml" media-type="application/xhtml+xml"/>
    <item id="c3" href="c3.xhtml" media-type="application/xhtml+xml"/>
    <item id="lost" href="lost.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="c1"/>
    <itemref idref="c3"/>
    <itemref idref="lost"/>
    <itemref idref="c2"/>
  </spine>
</package>"#;

    const NAV: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Contents</title></head>
<body><nav epub:type="toc"><ol>
  <li><a href="c1.xhtml">One</a></li>
  <li><a href="c2.xhtml">Two</a></li>
  <li><a href="c3.xhtml">Three</a></li>
</ol></nav></body>
</html>"#;

    fn chapter(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Heading</title></head>
<body>{body}</body></html>"#
        )
    }

    fn epub_fixture() -> Vec<u8> {
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let files = [
            ("mimetype", "application/epub+zip".to_string()),
            ("META-INF/container.xml", CONTAINER.to_string()),
            ("OEBPS/content.opf", PACKAGE.to_string()),
            ("OEBPS/nav.xhtml", NAV.to_string()),
            ("OEBPS/c1.xhtml", chapter("<p>first&amp;one</p>")),
            ("OEBPS/c2.xhtml", chapter("<p>second</p>")),
            ("OEBPS/c3.xhtml", chapter("<h1>third</h1>")),
        ];
        for (name, content) in files {
            zip.start_file(name, stored).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn opens_with_spine_length_and_metadata() {
        let doc = EpubDocument::open(epub_fixture()).unwrap();
        assert_eq!(doc.unit_count(), 4);
        assert_eq!(
            doc.info(),
            DocumentInfo {
                title: Some("Spine Order".to_string()),
                authors: vec!["Ann Writer".to_string()],
            }
        );
    }

    #[test]
    fn chapters_follow_spine_order_and_missing_ones_are_skipped() {
        let mut run = extract(epub_fixture(), DocumentKind::Epub, ExtractOptions::default()).unwrap();

        let mut numbers = Vec::new();
        let mut texts = Vec::new();
        for unit in run.by_ref() {
            let unit = unit.unwrap();
            numbers.push(unit.number);
            texts.push(tokenize_block(&unit.text));
        }

        assert_eq!(numbers, vec![1, 2, 4]);
        assert_eq!(texts, vec![vec!["first&one"], vec!["third"], vec!["second"]]);

        let summary = run.summary();
        assert_eq!(summary.units_skipped, 1);
        assert_eq!(summary.units_processed, summary.total_units);
        assert_eq!(summary.total_units, 4);
        assert!(run.is_released());
    }
}
