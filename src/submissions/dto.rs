use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::Submission;

/// Public path prefix under which stored files are reachable.
pub const UPLOADS_PREFIX: &str = "/uploads";

/// Wire shape of a submission; camelCase matches the existing web client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub file_path: String,
    #[serde(with = "time::serde::rfc3339")]
    pub submission_date: OffsetDateTime,
}

impl From<Submission> for SubmissionResponse {
    fn from(s: Submission) -> Self {
        Self {
            id: s.id,
            student_id: s.student_id,
            student_name: s.student_name,
            file_path: format!("{}/{}", UPLOADS_PREFIX, s.file_key),
            submission_date: s.submitted_at,
        }
    }
}
