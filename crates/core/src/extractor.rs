use crate::error::ExtractionError;
use lopdf::Document;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    /// Pages with extractable text, in page order.
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractionError>;

    /// Concatenated text of all pages; each page is followed by a newline.
    /// A PDF without any text layer yields an empty string.
    fn extract_text(&self, path: &Path) -> Result<String, ExtractionError> {
        let pages = self.extract_pages(path)?;
        Ok(join_pages(&pages))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractionError> {
        let bytes = std::fs::read(path).map_err(|source| ExtractionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document = Document::load_mem(&bytes).map_err(|error| ExtractionError::PdfParse {
            path: path.to_path_buf(),
            details: error.to_string(),
        })?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| ExtractionError::PageText {
                    path: path.to_path_buf(),
                    page: page_no,
                    details: error.to_string(),
                })?;

            // lopdf ends every text object with a newline; the join adds one per page.
            let text = text.trim_end_matches(['\r', '\n']);
            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text: text.to_string(),
                });
            }
        }

        if pages.is_empty() {
            tracing::warn!(path = %path.display(), "pdf has no extractable text");
        }

        Ok(pages)
    }
}

pub fn join_pages(pages: &[PageText]) -> String {
    let mut text = String::new();
    for page in pages {
        text.push_str(&page.text);
        text.push('\n');
    }
    text
}

pub fn extract_document_text(path: &Path) -> Result<String, ExtractionError> {
    LopdfExtractor.extract_text(path)
}
