// src/handlers/application.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        application::{
            Application, ApplicationListParams, ApplicationListResponse,
            CreateApplicationRequest, UpdateApplicationStatusRequest,
        },
        opportunity::{Opportunity, OpportunityStatus},
        user::Role,
    },
    utils::{html::clean_html, jwt::Claims},
};

/// Apply to an opportunity. Candidate only; the opportunity must be published
/// and the candidate must not have applied before. The unique constraint on
/// (opportunity_id, candidate_id) backs up the existence check under
/// concurrent requests.
pub async fn create_application(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateApplicationRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let candidate_id = claims.user_id();

    let opportunity = sqlx::query_as::<_, Opportunity>("SELECT * FROM opportunities WHERE id = $1")
        .bind(payload.opportunity_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Opportunity not found".to_string()))?;

    if opportunity.status != OpportunityStatus::Published {
        return Err(AppError::BadRequest(
            "This opportunity is not accepting applications".to_string(),
        ));
    }

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM applications WHERE opportunity_id = $1 AND candidate_id = $2",
    )
    .bind(payload.opportunity_id)
    .bind(candidate_id)
    .fetch_optional(&pool)
    .await?;

    if existing.is_some() {
        return Err(AppError::BadRequest(
            "You have already applied to this opportunity".to_string(),
        ));
    }

    let cover_letter = payload.cover_letter.as_deref().map(clean_html);

    let application = sqlx::query_as::<_, Application>(
        r#"
        INSERT INTO applications (opportunity_id, candidate_id, cover_letter, resume_url)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(payload.opportunity_id)
    .bind(candidate_id)
    .bind(cover_letter)
    .bind(payload.resume_url)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        let msg = e.to_string();
        if msg.contains("unique constraint") || msg.contains("23505") {
            AppError::BadRequest("You have already applied to this opportunity".to_string())
        } else {
            tracing::error!("Failed to create application: {:?}", e);
            AppError::InternalServerError(msg)
        }
    })?;

    Ok((StatusCode::CREATED, Json(application)))
}

/// Retrieve one application. Candidates see their own, recruiters see
/// applications against their own opportunities, admins see any. Unlike
/// opportunities, a denial here is Forbidden: authenticated users are not
/// kept unaware that the record exists.
pub async fn get_application(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let application = sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Application not found".to_string()))?;

    match claims.role {
        Role::Candidate => {
            if application.candidate_id != claims.user_id() {
                return Err(AppError::Forbidden(
                    "You do not have permission to view this application".to_string(),
                ));
            }
        }
        Role::Recruiter => {
            let recruiter_id = sqlx::query_scalar::<_, i64>(
                "SELECT recruiter_id FROM opportunities WHERE id = $1",
            )
            .bind(application.opportunity_id)
            .fetch_optional(&pool)
            .await?;

            if recruiter_id != Some(claims.user_id()) {
                return Err(AppError::Forbidden(
                    "You do not have permission to view this application".to_string(),
                ));
            }
        }
        Role::Admin => {}
    }

    Ok(Json(application))
}

/// List the caller's own applications, most recent first.
pub async fn list_by_candidate(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ApplicationListParams>,
) -> Result<impl IntoResponse, AppError> {
    let candidate_id = claims.user_id();

    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM applications
        WHERE candidate_id = $1
          AND ($2::application_status IS NULL OR status = $2)
        "#,
    )
    .bind(candidate_id)
    .bind(params.status)
    .fetch_one(&pool)
    .await?;

    let applications = sqlx::query_as::<_, Application>(
        r#"
        SELECT * FROM applications
        WHERE candidate_id = $1
          AND ($2::application_status IS NULL OR status = $2)
        ORDER BY applied_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(candidate_id)
    .bind(params.status)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(ApplicationListResponse {
        applications,
        total,
    }))
}

/// List the applications against one opportunity. Only its owning recruiter.
pub async fn list_by_opportunity(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(opportunity_id): Path<i64>,
    Query(params): Query<ApplicationListParams>,
) -> Result<impl IntoResponse, AppError> {
    let recruiter_id =
        sqlx::query_scalar::<_, i64>("SELECT recruiter_id FROM opportunities WHERE id = $1")
            .bind(opportunity_id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound("Opportunity not found".to_string()))?;

    if recruiter_id != claims.user_id() {
        return Err(AppError::Forbidden(
            "You do not have permission to view applications for this opportunity".to_string(),
        ));
    }

    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM applications
        WHERE opportunity_id = $1
          AND ($2::application_status IS NULL OR status = $2)
        "#,
    )
    .bind(opportunity_id)
    .bind(params.status)
    .fetch_one(&pool)
    .await?;

    let applications = sqlx::query_as::<_, Application>(
        r#"
        SELECT * FROM applications
        WHERE opportunity_id = $1
          AND ($2::application_status IS NULL OR status = $2)
        ORDER BY applied_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(opportunity_id)
    .bind(params.status)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(ApplicationListResponse {
        applications,
        total,
    }))
}

/// Move an application to any status. Only the recruiter owning the
/// referenced opportunity; the current status carries no precondition, so a
/// rejected application may be re-opened.
pub async fn update_application_status(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateApplicationStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let application = sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Application not found".to_string()))?;

    let recruiter_id =
        sqlx::query_scalar::<_, i64>("SELECT recruiter_id FROM opportunities WHERE id = $1")
            .bind(application.opportunity_id)
            .fetch_optional(&pool)
            .await?;

    if recruiter_id != Some(claims.user_id()) {
        return Err(AppError::Forbidden(
            "You do not have permission to update this application".to_string(),
        ));
    }

    let application = sqlx::query_as::<_, Application>(
        "UPDATE applications SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(payload.status)
    .bind(id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update application status: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(application))
}

/// Withdraw the caller's own application. Allowed only from pending,
/// reviewing or shortlisted; withdrawn is terminal. The transition is applied
/// with a conditional UPDATE so a concurrent status change cannot slip a
/// withdrawal past the state machine; a lost race re-reads the row and
/// reports the same error the plain path would.
pub async fn withdraw_application(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let application = sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Application not found".to_string()))?;

    if application.candidate_id != claims.user_id() {
        return Err(AppError::Forbidden(
            "You do not have permission to withdraw this application".to_string(),
        ));
    }

    application.status.withdraw_guard()?;

    let withdrawn = sqlx::query_as::<_, Application>(
        r#"
        UPDATE applications SET status = 'withdrawn', updated_at = NOW()
        WHERE id = $1 AND status IN ('pending', 'reviewing', 'shortlisted')
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?;

    match withdrawn {
        Some(application) => Ok(Json(application)),
        None => {
            // Lost a race against a concurrent status change; report from the
            // current row.
            let current =
                sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&pool)
                    .await?
                    .ok_or(AppError::NotFound("Application not found".to_string()))?;
            current.status.withdraw_guard()?;
            Err(AppError::InternalServerError(
                "Withdrawal failed unexpectedly".to_string(),
            ))
        }
    }
}
