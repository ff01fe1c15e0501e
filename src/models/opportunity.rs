// src/models/opportunity.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::utils::jwt::Claims;

/// Lifecycle status of an opportunity. No transition table applies: the owning
/// recruiter may move a posting to any status, including re-opening a closed
/// one. Archiving is the soft-delete and is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "opportunity_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OpportunityStatus {
    Draft,
    Published,
    Closed,
    Archived,
}

impl OpportunityStatus {
    /// Whether non-owners may see a record in this status at all.
    pub fn publicly_visible(&self) -> bool {
        matches!(self, OpportunityStatus::Published | OpportunityStatus::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "opportunity_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OpportunityType {
    Internship,
    Fellowship,
    Volunteer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "work_mode", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WorkMode {
    Remote,
    Onsite,
    Hybrid,
}

/// Represents the 'opportunities' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: i64,
    pub recruiter_id: i64,
    pub title: String,
    pub description: String,

    #[serde(rename = "type")]
    pub opportunity_type: OpportunityType,
    pub mode: WorkMode,
    pub location: Option<String>,
    pub category: String,

    /// Stored as a JSON array in the database; order is meaningful.
    pub skills: Json<Vec<String>>,

    /// Whole currency units per month, if the position is paid.
    pub stipend: Option<i64>,
    pub duration: Option<String>,
    pub deadline: chrono::DateTime<chrono::Utc>,
    pub positions: i32,

    pub status: OpportunityStatus,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Opportunity {
    /// Visibility rule: the owner always sees the record; everyone else only
    /// when it is published or closed. Callers surface a denial as NotFound so
    /// that private records do not reveal their existence.
    pub fn visible_to(&self, principal: Option<&Claims>) -> bool {
        if let Some(claims) = principal {
            if claims.user_id() == self.recruiter_id {
                return true;
            }
        }
        self.status.publicly_visible()
    }
}

/// DTO for posting a new opportunity. Status is not accepted here: every
/// posting starts as a draft.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOpportunityRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title length must be between 1 and 200 characters."
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 10000,
        message = "Description length must be between 1 and 10000 characters."
    ))]
    pub description: String,

    #[serde(rename = "type")]
    pub opportunity_type: OpportunityType,

    pub mode: WorkMode,

    #[validate(length(max = 200))]
    pub location: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub category: String,

    #[validate(custom(function = crate::models::user::validate_skills))]
    pub skills: Vec<String>,

    #[validate(range(min = 1, message = "Stipend must be a positive amount."))]
    pub stipend: Option<i64>,

    #[validate(length(max = 100))]
    pub duration: Option<String>,

    #[validate(custom(function = validate_future_deadline))]
    pub deadline: chrono::DateTime<chrono::Utc>,

    #[validate(range(min = 1, max = 100, message = "Positions must be between 1 and 100."))]
    pub positions: i32,
}

/// DTO for editing an opportunity. Fields are optional; only defined fields
/// are written. Status changes go through the dedicated status endpoint.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOpportunityRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 10000))]
    pub description: Option<String>,

    #[serde(rename = "type")]
    pub opportunity_type: Option<OpportunityType>,

    pub mode: Option<WorkMode>,

    #[validate(length(max = 200))]
    pub location: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,

    #[validate(custom(function = crate::models::user::validate_skills))]
    pub skills: Option<Vec<String>>,

    #[validate(range(min = 1))]
    pub stipend: Option<i64>,

    #[validate(length(max = 100))]
    pub duration: Option<String>,

    #[validate(custom(function = validate_future_deadline))]
    pub deadline: Option<chrono::DateTime<chrono::Utc>>,

    #[validate(range(min = 1, max = 100))]
    pub positions: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOpportunityStatusRequest {
    pub status: OpportunityStatus,
}

/// Query parameters for the public browse listing.
#[derive(Debug, Deserialize)]
pub struct OpportunityListParams {
    /// Case-insensitive substring match over title and description.
    pub search: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub opportunity_type: Option<OpportunityType>,
    pub mode: Option<WorkMode>,

    /// Number of items to return (default: 10, max: 100).
    pub limit: Option<i64>,
    pub offset: Option<i64>,

    /// Sort order: 'created_at' (default, newest first), 'deadline'
    /// (soonest first) or 'updated_at' (most recently touched first).
    pub sort_by: Option<String>,
}

impl OpportunityListParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// Whitelisted ORDER BY clause; unknown keys fall back to the default.
    pub fn order_clause(&self) -> &'static str {
        match self.sort_by.as_deref() {
            Some("deadline") => "deadline ASC",
            Some("updated_at") => "updated_at DESC",
            _ => "created_at DESC",
        }
    }
}

/// Query parameters for a recruiter's own board.
#[derive(Debug, Deserialize)]
pub struct RecruiterListParams {
    pub status: Option<OpportunityStatus>,

    /// Number of items to return (default: 50, max: 100).
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl RecruiterListParams {
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
pub struct OpportunityListResponse {
    pub opportunities: Vec<Opportunity>,
    pub total: i64,
}

pub fn validate_future_deadline(
    deadline: &chrono::DateTime<chrono::Utc>,
) -> Result<(), validator::ValidationError> {
    if *deadline <= chrono::Utc::now() {
        return Err(validator::ValidationError::new("deadline_must_be_future"));
    }
    Ok(())
}
