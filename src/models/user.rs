// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

/// The principal's role. Tagged so authorization logic can match exhaustively;
/// tokens carrying anything else fail deserialization at the auth gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Candidate,
    Recruiter,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Candidate => "candidate",
            Role::Recruiter => "recruiter",
            Role::Admin => "admin",
        }
    }
}

/// Represents the 'users' table in the database.
/// Rows are provisioned by the external identity service; this service only
/// reads them and updates profile fields.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    pub email: String,

    pub name: String,

    /// 'candidate', 'recruiter' or 'admin'.
    pub role: String,

    pub phone: Option<String>,

    pub bio: Option<String>,

    pub location: Option<String>,

    /// Stored as a JSON array in the database.
    pub skills: Json<Vec<String>>,

    pub resume_url: Option<String>,

    pub is_banned: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Public projection of a profile. Contact details, resume location and ban
/// status never leave the service through this DTO.
#[derive(Debug, Serialize, FromRow)]
pub struct PublicProfile {
    pub id: i64,
    pub name: String,
    pub role: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub skills: Json<Vec<String>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for updating the caller's own profile. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name length must be between 1 and 100 characters."
    ))]
    pub name: Option<String>,

    #[validate(length(max = 30))]
    pub phone: Option<String>,

    #[validate(length(max = 2000))]
    pub bio: Option<String>,

    #[validate(length(max = 100))]
    pub location: Option<String>,

    #[validate(custom(function = validate_skills))]
    pub skills: Option<Vec<String>>,

    #[validate(custom(function = crate::models::application::validate_http_url))]
    pub resume_url: Option<String>,
}

pub fn validate_skills(skills: &Vec<String>) -> Result<(), validator::ValidationError> {
    for skill in skills {
        if skill.is_empty() || skill.len() > 100 {
            return Err(validator::ValidationError::new("skill_length"));
        }
    }
    Ok(())
}
