//! Source document loading.
//!
//! PDFs are read page by page with `lopdf` and the page texts concatenated in
//! page order. Anything else is read as text; invalid UTF-8 is decoded lossily.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub fn load_document(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(Error::SourceNotFound(path.to_path_buf()));
    }
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    let text = if is_pdf { read_pdf(path)? } else { read_text(path)? };
    info!(path = %path.display(), chars = text.chars().count(), "loaded source document");
    Ok(text)
}

fn read_text(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            warn!(path = %path.display(), "source is not valid UTF-8, decoding lossily");
            Ok(String::from_utf8_lossy(&fs::read(path)?).to_string())
        }
        Err(e) => Err(e.into()),
    }
}

fn read_pdf(path: &Path) -> Result<String> {
    let doc = lopdf::Document::load(path)
        .map_err(|e| Error::Operation(format!("failed to open PDF {}: {e}", path.display())))?;
    let mut text = String::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(page) => {
                text.push_str(&page);
                if !page.ends_with('\n') {
                    text.push('\n');
                }
            }
            Err(e) => debug!(page = page_number, error = %e, "page has no extractable text"),
        }
    }
    Ok(text)
}
