//! Batch driver: one letterhead, many uploaded documents, one archive.
//!
//! Failure scoping:
//! - letterhead unparsable → the whole run fails (`Err`)
//! - an upload fails to parse, compose or write → that document is reported
//!   in the `BatchReport` and the run moves on
//!
//! Only `.pdf` output names are written, and a later upload with the same
//! name replaces the earlier output, so `written_count` always equals the
//! number of archive entries.
//!
//! Documents are processed strictly one after another. The output directory
//! is cleared when the run context is prepared, so the archive only ever
//! holds this run's outputs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::branding::archive::{build_archive, is_pdf_name};
use crate::branding::geometry::{FitSettings, PageSize};
use crate::branding::pdf::{compose, Letterhead, SourceDocument};
use crate::branding::writer::{write_with_retry, OutputWriter, RetryPolicy};
use crate::branding::BrandError;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// One uploaded file as received.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub file_name: String,
    pub bytes: Bytes,
}

impl UploadedDocument {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// The designated output location for a single run.
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    output_dir: PathBuf,
}

impl RunContext {
    /// Creates `output_dir` if needed and removes any regular files left in
    /// it by an earlier run.
    pub fn prepare(output_dir: &Path) -> Result<Self, BrandError> {
        fs::create_dir_all(output_dir)?;
        for entry in fs::read_dir(output_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(Self {
            run_id: Uuid::new_v4(),
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-facing message, scoped to one document or to the whole run.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub document: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Written { pages: usize, attempts: u32 },
    Skipped { reason: String },
    Failed { reason: String },
    /// Written, then overwritten by a later upload with the same output name.
    Replaced { by: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentResult {
    pub file_name: String,
    #[serde(flatten)]
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub letterhead: PageSize,
    pub documents: Vec<DocumentResult>,
    pub notices: Vec<Notice>,
}

impl BatchReport {
    pub fn written_count(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| matches!(d.status, DocumentStatus::Written { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.documents.len() - self.written_count()
    }

    fn notify(&mut self, level: NoticeLevel, document: Option<&str>, message: String) {
        let doc = document.unwrap_or("-");
        match level {
            NoticeLevel::Info | NoticeLevel::Success => info!(document = doc, "{message}"),
            NoticeLevel::Warning => warn!(document = doc, "{message}"),
            NoticeLevel::Error => error!(document = doc, "{message}"),
        }
        self.notices.push(Notice {
            level,
            document: document.map(str::to_string),
            message,
        });
    }
}

pub struct BatchOutcome {
    pub archive: Vec<u8>,
    pub report: BatchReport,
}

// ────────────────────────────────────────────────────────────────────────────
// Driver
// ────────────────────────────────────────────────────────────────────────────

/// Reduces an uploaded name to its last path component.
///
/// Browsers may send `C:\Users\...\cv.pdf`; both separators are stripped.
pub fn output_file_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    match name {
        "" | "." | ".." => None,
        _ => Some(name.to_string()),
    }
}

/// Runs branding batches against one output directory.
#[derive(Debug, Clone)]
pub struct BatchDriver<W> {
    output_dir: PathBuf,
    settings: FitSettings,
    retry: RetryPolicy,
    writer: W,
}

impl<W: OutputWriter> BatchDriver<W> {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        settings: FitSettings,
        retry: RetryPolicy,
        writer: W,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            settings,
            retry,
            writer,
        }
    }

    /// Brands every document in `documents` with the letterhead and returns
    /// the archive of everything that was written.
    pub fn process(
        &self,
        letterhead_bytes: &[u8],
        documents: &[UploadedDocument],
    ) -> Result<BatchOutcome, BrandError> {
        let ctx = RunContext::prepare(&self.output_dir)?;
        let span = info_span!("brand_run", run_id = %ctx.run_id());
        let _enter = span.enter();

        let letterhead = Letterhead::parse(letterhead_bytes)?;
        let size = letterhead.size();

        let mut report = BatchReport {
            run_id: ctx.run_id(),
            letterhead: size,
            documents: Vec::with_capacity(documents.len()),
            notices: Vec::new(),
        };
        report.notify(
            NoticeLevel::Info,
            None,
            format!("Letterhead size: {} x {} pts", size.width, size.height),
        );

        // output name -> index of the document whose file currently holds it
        let mut outputs: HashMap<String, usize> = HashMap::new();
        for upload in documents {
            let status = self.process_document(&ctx, &letterhead, upload, &mut report);
            if let (DocumentStatus::Written { .. }, Some(output)) =
                (&status, output_file_name(&upload.file_name))
            {
                if let Some(previous) = outputs.insert(output.clone(), report.documents.len()) {
                    let earlier = &mut report.documents[previous];
                    earlier.status = DocumentStatus::Replaced {
                        by: upload.file_name.clone(),
                    };
                    let earlier_name = earlier.file_name.clone();
                    report.notify(
                        NoticeLevel::Warning,
                        Some(&earlier_name),
                        format!("{output} was overwritten by a later upload with the same name"),
                    );
                }
            }
            report.documents.push(DocumentResult {
                file_name: upload.file_name.clone(),
                status,
            });
        }

        let archive = build_archive(ctx.output_dir())?;
        report.notify(
            NoticeLevel::Info,
            None,
            format!(
                "Run finished: {} written, {} not written",
                report.written_count(),
                report.failed_count()
            ),
        );

        Ok(BatchOutcome { archive, report })
    }

    fn process_document(
        &self,
        ctx: &RunContext,
        letterhead: &Letterhead,
        upload: &UploadedDocument,
        report: &mut BatchReport,
    ) -> DocumentStatus {
        let name = upload.file_name.as_str();

        let Some(file_name) = output_file_name(name) else {
            let reason = "upload has no usable file name".to_string();
            report.notify(NoticeLevel::Warning, Some(name), format!("Skipped: {reason}"));
            return DocumentStatus::Skipped { reason };
        };
        if !is_pdf_name(&file_name) {
            let reason = format!("{file_name} does not end in .pdf");
            report.notify(NoticeLevel::Warning, Some(name), format!("Skipped: {reason}"));
            return DocumentStatus::Skipped { reason };
        }

        let source = match SourceDocument::parse(&upload.bytes) {
            Ok(source) => source,
            Err(e) => {
                report.notify(
                    NoticeLevel::Warning,
                    Some(name),
                    format!("Failed to open {name}: {e}"),
                );
                return DocumentStatus::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        debug!(document = name, "Branding {} page(s)", source.page_count());
        let composed = compose(letterhead, source, &self.settings).and_then(|composed| {
            let pages = composed.page_count();
            let shrunk = composed.placements().iter().filter(|p| p.scale < 1.0).count();
            if shrunk > 0 {
                debug!(document = name, "{shrunk} of {pages} page(s) shrunk to fit");
            }
            composed.to_bytes().map(|bytes| (pages, bytes))
        });
        let (pages, bytes) = match composed {
            Ok(result) => result,
            Err(e) => {
                report.notify(
                    NoticeLevel::Warning,
                    Some(name),
                    format!("Failed to brand {name}: {e}"),
                );
                return DocumentStatus::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        let path = ctx.output_path(&file_name);
        let mut retries = Vec::new();
        let written = write_with_retry(
            &self.writer,
            &path,
            &bytes,
            &self.retry,
            |attempt, wait, err| {
                retries.push(format!(
                    "{err} writing {}, retrying in {:.1}s (attempt {attempt})",
                    path.display(),
                    wait.as_secs_f64()
                ));
            },
        );
        for message in retries {
            report.notify(NoticeLevel::Warning, Some(name), message);
        }

        match written {
            Ok(attempts) => {
                report.notify(
                    NoticeLevel::Success,
                    Some(name),
                    format!("{file_name} -> written to {}", ctx.output_dir().display()),
                );
                DocumentStatus::Written { pages, attempts }
            }
            Err(e) => {
                report.notify(
                    NoticeLevel::Error,
                    Some(name),
                    format!("Failed to write {}: {e}", path.display()),
                );
                DocumentStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
