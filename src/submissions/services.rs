use anyhow::Context;
use bytes::Bytes;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::repo_types::{NewSubmission, Submission};
use crate::{auth::claims::Identity, state::AppState};

const PDF_MAGIC: &[u8] = b"%PDF-";

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Why an upload was refused before anything was stored.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("Assignment file is required")]
    Missing,
    #[error("Only one assignment file is allowed")]
    Duplicate,
    #[error("File is empty")]
    Empty,
    #[error("Only PDF files are accepted")]
    NotPdf,
    #[error("File exceeds the {limit} byte limit")]
    TooLarge { limit: usize },
}

/// Declared type, size and leading bytes must all agree on "small PDF".
pub fn validate_pdf(item: &UploadItem, max_bytes: usize) -> Result<(), UploadRejection> {
    if ext_from_mime(&item.content_type) != Some("pdf") {
        return Err(UploadRejection::NotPdf);
    }
    if item.body.is_empty() {
        return Err(UploadRejection::Empty);
    }
    if item.body.len() > max_bytes {
        return Err(UploadRejection::TooLarge { limit: max_bytes });
    }
    if !item.body.starts_with(PDF_MAGIC) {
        return Err(UploadRejection::NotPdf);
    }
    Ok(())
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    let essence = ct.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case("application/pdf") {
        Some("pdf")
    } else {
        None
    }
}

/// `<unix-millis>-<8 hex>.<ext>`: upload time plus a suffix so same-millisecond
/// uploads do not collide.
pub fn storage_key(now: OffsetDateTime, ext: &str) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}.{}", millis, &suffix[..8], ext)
}

/// Writes the blob, then the record. A failed insert removes the blob again.
pub async fn store_submission(
    st: &AppState,
    owner: &Identity,
    item: UploadItem,
) -> anyhow::Result<Submission> {
    let ext = ext_from_mime(&item.content_type).context("content type not validated")?;
    let key = storage_key(OffsetDateTime::now_utc(), ext);

    st.storage
        .put_object(&key, item.body, &item.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;

    let inserted = st
        .submissions
        .insert(NewSubmission {
            student_id: owner.user_id,
            student_name: owner.username.clone(),
            file_key: key.clone(),
        })
        .await;

    match inserted {
        Ok(submission) => {
            info!(submission_id = %submission.id, user_id = %owner.user_id, file_key = %key, "submission stored");
            Ok(submission)
        }
        Err(e) => {
            if let Err(cleanup) = st.storage.delete_object(&key).await {
                error!(error = ?cleanup, file_key = %key, "orphaned blob after failed insert");
            }
            Err(e)
        }
    }
}

/// Removes the record and cascades to its blob. Blob failures are logged only.
pub async fn delete_submission(st: &AppState, id: Uuid) -> anyhow::Result<Option<Submission>> {
    let Some(removed) = st.submissions.delete(id).await? else {
        return Ok(None);
    };
    if let Err(e) = st.storage.delete_object(&removed.file_key).await {
        warn!(error = ?e, submission_id = %id, file_key = %removed.file_key, "blob delete failed");
    }
    info!(submission_id = %id, "submission deleted");
    Ok(Some(removed))
}
