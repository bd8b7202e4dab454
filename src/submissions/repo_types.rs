use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Submission metadata. The file itself lives in blob storage under `file_key`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Submission {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub file_key: String,
    pub submitted_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub student_id: Uuid,
    pub student_name: String,
    pub file_key: String,
}
