// src/models/application.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Status of an application. Recruiters may move an application to any status
/// at any time; candidates only leave early through the withdrawal transition
/// guarded by [`ApplicationStatus::withdraw_guard`]. The two rules are
/// deliberately asymmetric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "application_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Reviewing,
    Shortlisted,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    /// Candidate withdrawal state machine: only pending, reviewing and
    /// shortlisted applications may move to withdrawn. Withdrawn is terminal.
    pub fn withdraw_guard(&self) -> Result<(), AppError> {
        match self {
            ApplicationStatus::Pending
            | ApplicationStatus::Reviewing
            | ApplicationStatus::Shortlisted => Ok(()),
            ApplicationStatus::Withdrawn => Err(AppError::BadRequest(
                "Application is already withdrawn".to_string(),
            )),
            ApplicationStatus::Accepted | ApplicationStatus::Rejected => Err(AppError::BadRequest(
                "Cannot withdraw an accepted or rejected application".to_string(),
            )),
        }
    }
}

/// Represents the 'applications' table in the database.
/// One row per (opportunity, candidate) pair, enforced by a unique constraint.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub opportunity_id: i64,

    /// Always the authenticated principal at creation time, never
    /// client-supplied.
    pub candidate_id: i64,

    pub cover_letter: Option<String>,
    pub resume_url: Option<String>,

    pub status: ApplicationStatus,

    pub applied_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for applying to an opportunity.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateApplicationRequest {
    pub opportunity_id: i64,

    #[validate(length(
        min = 1,
        max = 2000,
        message = "Cover letter length must be between 1 and 2000 characters."
    ))]
    pub cover_letter: Option<String>,

    #[validate(custom(function = validate_http_url))]
    pub resume_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateApplicationStatusRequest {
    pub status: ApplicationStatus,
}

/// Query parameters shared by the candidate and recruiter application lists.
#[derive(Debug, Deserialize)]
pub struct ApplicationListParams {
    pub status: Option<ApplicationStatus>,

    /// Number of items to return (default: 50, max: 100).
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ApplicationListParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Paged listing response; `total` is the full filtered count, independent of
/// limit/offset.
#[derive(Debug, Serialize)]
pub struct ApplicationListResponse {
    pub applications: Vec<Application>,
    pub total: i64,
}

/// Accepts http(s) URLs only. Used for resume and portfolio links.
pub fn validate_http_url(value: &str) -> Result<(), validator::ValidationError> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(validator::ValidationError::new("invalid_url")),
    }
}
