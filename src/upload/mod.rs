//! Per-file upload tracking.
//!
//! [`UploadManager`] owns every admitted [`UploadRecord`]. Records move
//! `Uploading -> Success` or `Uploading -> Error` and never leave a terminal
//! state except by removal. All mutation goes through id-keyed methods that
//! silently ignore ids no longer in the set, so late progress events for a
//! removed file are harmless.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

mod driver;

pub use driver::{
    ProgressSchedule, UploadDriver, UploadFailure, UploadReceipt, UploadTransport, UploadUpdate,
};

pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

const MIME_PDF: &str = "application/pdf";
const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const MIME_TEXT: &str = "text/plain";
const MIME_UNKNOWN: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Pdf,
    Docx,
    PlainText,
}

impl MediaType {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            MIME_PDF => Some(Self::Pdf),
            MIME_DOCX => Some(Self::Docx),
            MIME_TEXT => Some(Self::PlainText),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Pdf => MIME_PDF,
            Self::Docx => MIME_DOCX,
            Self::PlainText => MIME_TEXT,
        }
    }
}

/// Declares a media type from the file extension, the way a browser file picker does.
pub fn declared_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("pdf") => MIME_PDF,
        Some("docx") => MIME_DOCX,
        Some("txt") => MIME_TEXT,
        _ => MIME_UNKNOWN,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHandle {
    pub path: PathBuf,
    pub name: String,
    pub size_bytes: u64,
    pub declared_mime: String,
}

impl FileHandle {
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)
            .with_context(|| format!("failed to inspect upload candidate: {}", path.display()))?;
        if !metadata.is_file() {
            anyhow::bail!("not a regular file: {}", path.display());
        }

        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            name,
            size_bytes: metadata.len(),
            declared_mime: declared_mime(path).to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeRejection {
    #[error("{name}: unsupported file type `{mime}` (PDF, DOCX or TXT only)")]
    UnsupportedType { name: String, mime: String },
    #[error("{name}: {size_bytes} bytes exceeds the 10 MB limit")]
    TooLarge { name: String, size_bytes: u64 },
}

/// Admission predicate applied before any record exists.
pub fn validate(file: &FileHandle) -> Result<MediaType, IntakeRejection> {
    let media_type =
        MediaType::from_mime(&file.declared_mime).ok_or_else(|| IntakeRejection::UnsupportedType {
            name: file.name.clone(),
            mime: file.declared_mime.clone(),
        })?;

    if file.size_bytes > MAX_UPLOAD_BYTES {
        return Err(IntakeRejection::TooLarge {
            name: file.name.clone(),
            size_bytes: file.size_bytes,
        });
    }

    Ok(media_type)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UploadId(u64);

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upl-{:04}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Uploading,
    Success,
    Error,
}

impl UploadStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Uploading)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Success => "complete",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadRecord {
    pub id: UploadId,
    pub file: FileHandle,
    pub media_type: MediaType,
    pub progress: u8,
    pub status: UploadStatus,
    pub failure: Option<String>,
    pub receipt: Option<UploadReceipt>,
}

/// What a single event did to the record it targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advanced { progress: u8 },
    Succeeded,
    Failed,
    Ignored,
}

#[derive(Debug, Default)]
pub struct UploadManager {
    records: Vec<UploadRecord>,
    next_id: u64,
}

impl UploadManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, file: FileHandle) -> Result<UploadId, IntakeRejection> {
        let media_type = validate(&file)?;

        self.next_id += 1;
        let id = UploadId(self.next_id);
        self.records.push(UploadRecord {
            id,
            file,
            media_type,
            progress: 0,
            status: UploadStatus::Uploading,
            failure: None,
            receipt: None,
        });

        Ok(id)
    }

    pub fn records(&self) -> &[UploadRecord] {
        &self.records
    }

    pub fn get(&self, id: UploadId) -> Option<&UploadRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    fn uploading_mut(&mut self, id: UploadId) -> Option<&mut UploadRecord> {
        self.records
            .iter_mut()
            .find(|record| record.id == id && record.status == UploadStatus::Uploading)
    }

    /// Applies a progress report. Lower values than the current progress are
    /// ignored and a report of 100 completes the record.
    pub fn on_progress(&mut self, id: UploadId, percent: u8) -> Transition {
        let Some(record) = self.uploading_mut(id) else {
            return Transition::Ignored;
        };

        let percent = percent.min(100);
        if percent <= record.progress {
            return Transition::Ignored;
        }

        record.progress = percent;
        if percent == 100 {
            record.status = UploadStatus::Success;
            return Transition::Succeeded;
        }

        Transition::Advanced { progress: percent }
    }

    /// Advances by `increment`, capped at `ceiling`.
    pub fn step(&mut self, id: UploadId, increment: u8, ceiling: u8) -> Transition {
        let Some(current) = self.uploading_mut(id).map(|record| record.progress) else {
            return Transition::Ignored;
        };

        let target = current.saturating_add(increment).min(ceiling).min(100);
        self.on_progress(id, target)
    }

    pub fn complete(&mut self, id: UploadId, receipt: Option<UploadReceipt>) -> Transition {
        let Some(record) = self.uploading_mut(id) else {
            return Transition::Ignored;
        };

        record.progress = 100;
        record.status = UploadStatus::Success;
        record.receipt = receipt;
        Transition::Succeeded
    }

    pub fn fail(&mut self, id: UploadId, reason: impl Into<String>) -> Transition {
        let Some(record) = self.uploading_mut(id) else {
            return Transition::Ignored;
        };

        record.status = UploadStatus::Error;
        record.failure = Some(reason.into());
        Transition::Failed
    }

    pub fn remove(&mut self, id: UploadId) -> Option<UploadRecord> {
        let index = self.records.iter().position(|record| record.id == id)?;
        Some(self.records.remove(index))
    }

    pub fn clear(&mut self) -> Vec<UploadRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn has_pending(&self) -> bool {
        self.records
            .iter()
            .any(|record| record.status == UploadStatus::Uploading)
    }

    pub fn all_succeeded(&self) -> bool {
        !self.records.is_empty()
            && self
                .records
                .iter()
                .all(|record| record.status == UploadStatus::Success)
    }

    pub fn count_with(&self, status: UploadStatus) -> usize {
        self.records
            .iter()
            .filter(|record| record.status == status)
            .count()
    }
}
