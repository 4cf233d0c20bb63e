//! ZIP packaging of a run's output directory.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::branding::BrandError;

/// File name offered to the caller for the download.
pub const ARCHIVE_NAME: &str = "branded_cvs.zip";

pub(crate) fn is_pdf_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

/// Zips every `.pdf` file directly inside `dir`, keyed by bare file name and
/// in name order.
pub fn build_archive(dir: &Path) -> Result<Vec<u8>, BrandError> {
    let mut entries: Vec<(String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if is_pdf_name(&name) {
            entries.push((name, entry.path()));
        }
    }
    entries.sort();

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, path) in entries {
        zip.start_file(name, options)
            .map_err(|e| BrandError::Archive(e.to_string()))?;
        zip.write_all(&fs::read(path)?)?;
    }
    let cursor = zip
        .finish()
        .map_err(|e| BrandError::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}
