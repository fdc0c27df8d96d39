use std::collections::HashMap;
use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{ApiError, ContractUploader};
use crate::cli::UploadArgs;
use crate::commands::{connect, guard_session};
use crate::display::file_glyph;
use crate::upload::{
    FileHandle, ProgressSchedule, Transition, UploadDriver, UploadId, UploadManager, UploadRecord,
    UploadStatus, UploadTransport, UploadUpdate,
};
use crate::util::{format_megabytes, sha256_file, write_json_stdout};

#[derive(Debug, Serialize)]
struct UploadRow<'a> {
    id: String,
    file: &'a str,
    kind: &'static str,
    size_bytes: u64,
    sha256: Option<&'a str>,
    status: &'static str,
    progress: u8,
    failure: Option<&'a str>,
    document_id: Option<&'a str>,
    chunk_count: Option<usize>,
}

#[derive(Debug, Serialize)]
struct UploadSummary<'a> {
    uploads: Vec<UploadRow<'a>>,
    rejected: &'a [String],
    cancelled: Vec<&'a str>,
    all_succeeded: bool,
}

pub async fn run(args: UploadArgs) -> Result<()> {
    let (client, store) = connect(&args.connection)?;
    let session = store.require()?;

    let transport = ContractUploader::new(client, session, args.expiry_date.clone());
    let schedule = ProgressSchedule {
        interval: Duration::from_millis(args.tick_ms.max(1)),
        ..ProgressSchedule::default()
    };

    let mut driver = UploadDriver::new(transport, schedule);
    let mut rejected = Vec::new();
    let mut fingerprints = HashMap::new();
    for path in &args.files {
        let file = match FileHandle::from_path(path) {
            Ok(file) => file,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping upload candidate");
                rejected.push(format!("{err:#}"));
                continue;
            }
        };

        match driver.admit(file) {
            Ok(id) => match sha256_file(path) {
                Ok(digest) => {
                    debug!(id = %id, sha256 = %digest, "file fingerprinted");
                    fingerprints.insert(id, digest);
                }
                Err(err) => debug!(id = %id, error = %err, "fingerprint unavailable"),
            },
            Err(rejection) => {
                warn!(reason = %rejection, "file rejected");
                rejected.push(rejection.to_string());
            }
        }
    }

    info!(
        admitted = driver.manager().records().len(),
        rejected = rejected.len(),
        "uploads started"
    );
    let interrupted = tokio::select! {
        () = driver.run_until_settled(log_update) => false,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            true
        }
    };

    if driver.session_rejected() {
        let abandoned = driver.clear();
        warn!(abandoned = abandoned.len(), "session rejected during upload");
        return guard_session(&store, Err::<(), _>(ApiError::Unauthorized));
    }
    let cancelled = if interrupted {
        cancel_in_flight(&mut driver)
    } else {
        Vec::new()
    };

    let manager = driver.manager();
    let uploaded = manager.count_with(UploadStatus::Success);
    let failed = manager.count_with(UploadStatus::Error);
    let all_succeeded = manager.all_succeeded() && rejected.is_empty() && cancelled.is_empty();
    info!(
        uploaded,
        failed,
        rejected = rejected.len(),
        cancelled = cancelled.len(),
        "uploads settled"
    );

    if args.json {
        write_json_stdout(&UploadSummary {
            uploads: manager
                .records()
                .iter()
                .map(|record| upload_row(record, &fingerprints))
                .collect(),
            rejected: &rejected,
            cancelled: cancelled.iter().map(|record| record.file.name.as_str()).collect(),
            all_succeeded,
        })?;
    } else {
        let mut output = io::BufWriter::new(io::stdout().lock());
        write_summary_text(&mut output, manager, &rejected, &cancelled, all_succeeded)?;
        output.flush()?;
    }

    if !all_succeeded {
        bail!(
            "{} of {} files did not upload",
            failed + rejected.len() + cancelled.len(),
            manager.records().len() + rejected.len() + cancelled.len()
        );
    }
    Ok(())
}

/// Removes every record still uploading, cancelling its ticker and transfer.
fn cancel_in_flight<T: UploadTransport>(driver: &mut UploadDriver<T>) -> Vec<UploadRecord> {
    let in_flight = driver
        .manager()
        .records()
        .iter()
        .filter(|record| !record.status.is_terminal())
        .map(|record| record.id)
        .collect::<Vec<_>>();

    let removed = in_flight
        .into_iter()
        .filter_map(|id| driver.remove(id))
        .collect::<Vec<_>>();
    warn!(cancelled = removed.len(), "upload interrupted");
    removed
}

fn log_update(update: &UploadUpdate, manager: &UploadManager) {
    let Some(record) = manager.get(update.id) else {
        return;
    };

    match update.transition {
        Transition::Advanced { progress } => {
            info!(id = %record.id, file = %record.file.name, progress, "uploading");
        }
        Transition::Succeeded => info!(id = %record.id, file = %record.file.name, "upload complete"),
        Transition::Failed | Transition::Ignored => {}
    }
}

fn upload_row<'a>(record: &'a UploadRecord, fingerprints: &'a HashMap<UploadId, String>) -> UploadRow<'a> {
    UploadRow {
        id: record.id.to_string(),
        file: &record.file.name,
        kind: file_glyph(record.media_type),
        size_bytes: record.file.size_bytes,
        sha256: fingerprints.get(&record.id).map(String::as_str),
        status: record.status.as_str(),
        progress: record.progress,
        failure: record.failure.as_deref(),
        document_id: record
            .receipt
            .as_ref()
            .and_then(|receipt| receipt.document_id.as_deref()),
        chunk_count: record.receipt.as_ref().map(|receipt| receipt.chunk_count),
    }
}

fn write_summary_text(
    output: &mut impl Write,
    manager: &UploadManager,
    rejected: &[String],
    cancelled: &[UploadRecord],
    all_succeeded: bool,
) -> Result<()> {
    writeln!(
        output,
        "Uploads: {} complete, {} failed, {} rejected, {} cancelled",
        manager.count_with(UploadStatus::Success),
        manager.count_with(UploadStatus::Error),
        rejected.len(),
        cancelled.len()
    )?;
    for record in manager.records() {
        let outcome = match (&record.failure, &record.receipt) {
            (Some(reason), _) => reason.clone(),
            (None, Some(receipt)) => match &receipt.document_id {
                Some(id) => format!("document {id} ({} chunks)", receipt.chunk_count),
                None => format!("{} chunks", receipt.chunk_count),
            },
            (None, None) => format!("{}%", record.progress),
        };

        writeln!(
            output,
            "{}\t{}\t{}\t{}\t{}\t{}",
            record.id,
            file_glyph(record.media_type),
            record.file.name,
            format_megabytes(record.file.size_bytes),
            record.status.as_str(),
            outcome
        )?;
    }
    for reason in rejected {
        writeln!(output, "rejected\t{reason}")?;
    }
    for record in cancelled {
        writeln!(output, "cancelled\t{}\t{}%", record.file.name, record.progress)?;
    }

    if all_succeeded && !manager.records().is_empty() {
        writeln!(
            output,
            "Upload successful! Your contracts are being processed. View them with `contractwise contracts list`."
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::{MediaType, UploadReceipt};

    fn handle(name: &str, mime: MediaType) -> FileHandle {
        FileHandle {
            path: name.into(),
            name: name.to_string(),
            size_bytes: 2_048,
            declared_mime: mime.mime().to_string(),
        }
    }

    #[test]
    fn rows_carry_fingerprint_and_receipt() {
        let mut manager = UploadManager::new();
        let id = manager
            .admit(handle("lease.pdf", MediaType::Pdf))
            .expect("admit");
        manager.complete(
            id,
            Some(UploadReceipt {
                document_id: Some("d-9".to_string()),
                chunk_count: 3,
            }),
        );

        let mut fingerprints = HashMap::new();
        fingerprints.insert(id, "abc123".to_string());

        let record = manager.get(id).expect("record");
        let row = upload_row(record, &fingerprints);
        assert_eq!(row.id, "upl-0001");
        assert_eq!(row.kind, "PDF");
        assert_eq!(row.sha256, Some("abc123"));
        assert_eq!(row.status, "complete");
        assert_eq!(row.progress, 100);
        assert_eq!(row.document_id, Some("d-9"));
        assert_eq!(row.chunk_count, Some(3));
    }

    #[test]
    fn failed_rows_expose_reason() {
        let mut manager = UploadManager::new();
        let id = manager
            .admit(handle("notes.txt", MediaType::PlainText))
            .expect("admit");
        manager.fail(id, "Upload failed (HTTP 500)");

        let record = manager.get(id).expect("record");
        let fingerprints = HashMap::new();
        let row = upload_row(record, &fingerprints);
        assert_eq!(row.status, "error");
        assert_eq!(row.failure, Some("Upload failed (HTTP 500)"));
        assert_eq!(row.sha256, None);
        assert_eq!(row.chunk_count, None);
    }

    #[test]
    fn summary_lists_each_file_once_with_its_size() {
        let mut manager = UploadManager::new();
        let mut lease = handle("lease.pdf", MediaType::Pdf);
        lease.size_bytes = 1024 * 1024 * 3 / 2;
        let done = manager.admit(lease).expect("admit lease");
        manager.complete(
            done,
            Some(UploadReceipt {
                document_id: Some("d-9".to_string()),
                chunk_count: 2,
            }),
        );
        let pending = manager
            .admit(handle("notes.txt", MediaType::PlainText))
            .expect("admit notes");
        manager.on_progress(pending, 40);
        let cancelled = manager.remove(pending).into_iter().collect::<Vec<_>>();

        let mut buffer = Vec::new();
        write_summary_text(&mut buffer, &manager, &[], &cancelled, false).expect("render");
        let text = String::from_utf8(buffer).expect("utf8");

        assert!(text.starts_with("Uploads: 1 complete, 0 failed, 0 rejected, 1 cancelled\n"));
        assert!(text.contains("upl-0001\tPDF\tlease.pdf\t1.50 MB\tcomplete\tdocument d-9 (2 chunks)\n"));
        assert!(!text.contains("MB MB"));
        assert!(text.contains("cancelled\tnotes.txt\t40%\n"));
        assert!(!text.contains("Upload successful"));
    }

    #[tokio::test]
    async fn rejected_session_on_upload_reaches_login_boundary() {
        use axum::Router;
        use axum::http::StatusCode;
        use axum::routing::post;

        use crate::commands::testing::{connection, serve, signed_in};

        let router = Router::new().route(
            "/contracts/upload",
            post(|| async { (StatusCode::UNAUTHORIZED, "{\"detail\": \"Invalid token\"}") }),
        );
        let base_url = serve(router).await;

        let dir = tempfile::tempdir().expect("tempdir");
        let store = signed_in(dir.path());
        let path = dir.path().join("lease.pdf");
        std::fs::write(&path, b"%PDF-1.7 lease").expect("write fixture");

        let args = UploadArgs {
            connection: connection(dir.path(), base_url),
            files: vec![path],
            expiry_date: None,
            tick_ms: 5,
            json: true,
        };
        let err = run(args).await.expect_err("rejected session");

        assert!(
            err.chain()
                .any(|cause| matches!(cause.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)))
        );
        assert!(store.load().expect("load").is_none());
    }
}
