//! ComicRack library document: loading and path matching.

use crate::error::{Result, SyncError};
use crate::models::SourceRecord;
use crate::normalize::normalize_path;
use roxmltree::{Document, Node};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// All `Book` records of one ComicRack document, in document order.
#[derive(Debug, Default)]
pub struct SourceCatalog {
    records: Vec<SourceRecord>,
}

impl SourceCatalog {
    pub fn from_records(records: Vec<SourceRecord>) -> Self {
        Self { records }
    }

    /// Read and parse a ComicRack XML file.
    pub fn load(path: &Path) -> Result<Self> {
        let xml = fs::read_to_string(path).map_err(|source| SyncError::SourceRead {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::parse(&xml)?;
        info!("ComicRack XML file parsed successfully ({} books).", catalog.len());
        Ok(catalog)
    }

    /// Parse a ComicRack document: `<*><Books><Book File="..">...</Book></Books></*>`.
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml.trim_start_matches('\u{FEFF}'))?;
        let books = child_element(doc.root_element(), "Books")
            .ok_or_else(|| SyncError::SourceParse("no Books element under the document root".to_string()))?;

        let mut records = Vec::new();
        for book in books
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "Book")
        {
            let Some(file) = book.attribute("File") else {
                warn!("Skipping Book without File attribute at byte {}", book.range().start);
                continue;
            };
            let mut record = SourceRecord::new(file);
            for child in book.children().filter(|n| n.is_element()) {
                record.set_field(child.tag_name().name(), child.text().unwrap_or(""));
            }
            records.push(record);
        }

        Ok(Self { records })
    }

    pub fn records(&self) -> &[SourceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find the first book whose normalized `File` contains the normalized target path.
    ///
    /// Database paths are often relative to the library root while ComicRack
    /// stores absolute paths, hence containment rather than equality. When
    /// several books qualify, document order decides.
    pub fn find_by_path(&self, target_path: &str) -> Option<&SourceRecord> {
        let needle = normalize_path(target_path);
        // Every path contains "", so an empty path would match the first book
        if needle.is_empty() {
            debug!("Empty target path never matches");
            return None;
        }
        let found = self.records.iter().find(|r| r.file_norm.contains(&needle));
        if found.is_none() {
            debug!("Did not find XML book entry for {}", target_path);
        }
        found
    }
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = r#"<?xml version="1.0"?>
<ComicDatabase Name="Library">
  <Books>
    <Book Id="1" File="C:\Comics\DC\Batman 001.cbz">
      <Series>Batman</Series>
      <Number>1</Number>
      <Year>1940</Year>
      <Summary></Summary>
    </Book>
    <Book Id="2" File="C:\Comics\DC\Batman 001.cbz.bak">
      <Series>Wrong</Series>
    </Book>
    <Book Id="3">
      <Series>No file</Series>
    </Book>
    <Book Id="4" File="D:/Manga/Akira 01.cbr">
      <Title>Akira &amp; Tetsuo</Title>
    </Book>
  </Books>
</ComicDatabase>"#;

    #[test]
    fn test_parse_library() {
        let catalog = SourceCatalog::parse(LIBRARY).unwrap();
        assert_eq!(catalog.len(), 3);

        let first = &catalog.records()[0];
        assert_eq!(first.file, "C:\\Comics\\DC\\Batman 001.cbz");
        assert_eq!(first.file_norm, "c:/comics/dc/batman 001.cbz");
        assert_eq!(first.field("Series"), Some("Batman"));
        assert_eq!(first.field("Summary"), None);
        assert_eq!(catalog.records()[2].field("Title"), Some("Akira & Tetsuo"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            SourceCatalog::parse("<ComicDatabase><Books>"),
            Err(SyncError::SourceParse(_))
        ));
        assert!(matches!(
            SourceCatalog::parse("<ComicDatabase/>"),
            Err(SyncError::SourceParse(_))
        ));
        let empty = SourceCatalog::parse("<ComicDatabase><Books/></ComicDatabase>").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_find_by_path_first_match_wins() {
        let catalog = SourceCatalog::parse(LIBRARY).unwrap();
        // Both Book 1 and Book 2 contain the target; document order decides
        let found = catalog.find_by_path("DC/Batman 001.cbz").unwrap();
        assert_eq!(found.field("Series"), Some("Batman"));
    }

    #[test]
    fn test_find_by_path_relative_and_case() {
        let catalog = SourceCatalog::parse(LIBRARY).unwrap();
        let found = catalog.find_by_path("\\manga\\AKIRA 01.cbr").unwrap();
        assert_eq!(found.file, "D:/Manga/Akira 01.cbr");
        assert!(catalog.find_by_path("/Marvel/Hulk 001.cbz").is_none());
    }

    #[test]
    fn test_find_by_path_declared_order() {
        let catalog = SourceCatalog::from_records(vec![
            SourceRecord::new("/lib/b/x.cbz").with_field("Series", "B"),
            SourceRecord::new("/lib/a/x.cbz").with_field("Series", "A"),
        ]);
        assert_eq!(catalog.find_by_path("x.cbz").unwrap().field("Series"), Some("B"));
        assert_eq!(catalog.find_by_path("a/x.cbz").unwrap().field("Series"), Some("A"));
    }

    #[test]
    fn test_find_by_path_empty_never_matches() {
        let catalog = SourceCatalog::parse(LIBRARY).unwrap();
        assert!(catalog.find_by_path("").is_none());
        // Strips to nothing
        assert!(catalog.find_by_path("\u{7f}\u{e9}").is_none());
    }

    #[test]
    fn test_parse_repeated_element_first_wins() {
        let catalog = SourceCatalog::parse(
            r#"<ComicDatabase><Books>
                <Book File="C:/Comics/Batman 001.cbz">
                  <Series>Batman</Series>
                  <Series>Detective Comics</Series>
                  <Title/>
                  <Title>Late title</Title>
                </Book>
            </Books></ComicDatabase>"#,
        )
        .unwrap();
        let book = &catalog.records()[0];
        assert_eq!(book.field("Series"), Some("Batman"));
        assert_eq!(book.field("Title"), None);
    }
}
