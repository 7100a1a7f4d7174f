use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Characters of the job description kept alongside a stored result.
const JOB_EXCERPT_CHARS: usize = 160;

/// A successfully generated résumé kept in the "recent results" list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentResult {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub job_excerpt: String,
    pub document: String,
}

impl RecentResult {
    pub fn new(job_description: &str, document: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            job_excerpt: job_description
                .trim()
                .chars()
                .take(JOB_EXCERPT_CHARS)
                .collect(),
            document: document.to_string(),
        }
    }
}
