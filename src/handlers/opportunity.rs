// src/handlers/opportunity.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::opportunity::{
        CreateOpportunityRequest, Opportunity, OpportunityListParams, OpportunityListResponse,
        OpportunityStatus, RecruiterListParams, UpdateOpportunityRequest,
        UpdateOpportunityStatusRequest,
    },
    utils::{html::clean_html, jwt::Claims},
};

/// Post a new opportunity. Recruiter only; every posting starts as a draft.
pub async fn create_opportunity(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateOpportunityRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let description = clean_html(&payload.description);

    let opportunity = sqlx::query_as::<_, Opportunity>(
        r#"
        INSERT INTO opportunities
        (recruiter_id, title, description, opportunity_type, mode, location,
         category, skills, stipend, duration, deadline, positions)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(claims.user_id())
    .bind(payload.title)
    .bind(description)
    .bind(payload.opportunity_type)
    .bind(payload.mode)
    .bind(payload.location)
    .bind(payload.category)
    .bind(SqlJson(payload.skills))
    .bind(payload.stipend)
    .bind(payload.duration)
    .bind(payload.deadline)
    .bind(payload.positions)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create opportunity: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(opportunity)))
}

/// Edit an opportunity. Only the owning recruiter; only defined fields are
/// written and `updated_at` always advances.
pub async fn update_opportunity(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateOpportunityRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let existing = sqlx::query_as::<_, Opportunity>("SELECT * FROM opportunities WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Opportunity not found".to_string()))?;

    if existing.recruiter_id != claims.user_id() {
        return Err(AppError::Forbidden(
            "You do not have permission to update this opportunity".to_string(),
        ));
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE opportunities SET updated_at = NOW()");

    if let Some(title) = payload.title {
        builder.push(", title = ");
        builder.push_bind(title);
    }
    if let Some(description) = payload.description {
        builder.push(", description = ");
        builder.push_bind(clean_html(&description));
    }
    if let Some(opportunity_type) = payload.opportunity_type {
        builder.push(", opportunity_type = ");
        builder.push_bind(opportunity_type);
    }
    if let Some(mode) = payload.mode {
        builder.push(", mode = ");
        builder.push_bind(mode);
    }
    if let Some(location) = payload.location {
        builder.push(", location = ");
        builder.push_bind(location);
    }
    if let Some(category) = payload.category {
        builder.push(", category = ");
        builder.push_bind(category);
    }
    if let Some(skills) = payload.skills {
        builder.push(", skills = ");
        builder.push_bind(SqlJson(skills));
    }
    if let Some(stipend) = payload.stipend {
        builder.push(", stipend = ");
        builder.push_bind(stipend);
    }
    if let Some(duration) = payload.duration {
        builder.push(", duration = ");
        builder.push_bind(duration);
    }
    if let Some(deadline) = payload.deadline {
        builder.push(", deadline = ");
        builder.push_bind(deadline);
    }
    if let Some(positions) = payload.positions {
        builder.push(", positions = ");
        builder.push_bind(positions);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");

    let opportunity: Opportunity =
        builder.build_query_as().fetch_one(&pool).await.map_err(|e| {
            tracing::error!("Failed to update opportunity: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(opportunity))
}

/// Retire an opportunity (soft delete): sets status to archived. Idempotent;
/// archiving an archived posting just re-stamps `updated_at`.
pub async fn delete_opportunity(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let existing = sqlx::query_as::<_, Opportunity>("SELECT * FROM opportunities WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Opportunity not found".to_string()))?;

    if existing.recruiter_id != claims.user_id() {
        return Err(AppError::Forbidden(
            "You do not have permission to delete this opportunity".to_string(),
        ));
    }

    let opportunity = sqlx::query_as::<_, Opportunity>(
        "UPDATE opportunities SET status = 'archived', updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to archive opportunity: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(opportunity))
}

/// Retrieve a single opportunity. Public route with optional session: the
/// owner sees any status, everyone else only published/closed. A hidden
/// record answers NotFound, never Forbidden.
pub async fn get_opportunity(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Option<Claims>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let opportunity = sqlx::query_as::<_, Opportunity>("SELECT * FROM opportunities WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Opportunity not found".to_string()))?;

    if !opportunity.visible_to(claims.as_ref()) {
        return Err(AppError::NotFound("Opportunity not found".to_string()));
    }

    Ok(Json(opportunity))
}

/// Browse published and closed opportunities. Drafts and archived postings
/// never appear here, no matter who asks.
pub async fn list_opportunities(
    State(pool): State<PgPool>,
    Query(params): Query<OpportunityListParams>,
) -> Result<impl IntoResponse, AppError> {
    let search_pattern = params.search.as_ref().map(|s| format!("%{}%", s));

    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM opportunities
        WHERE status IN ('published', 'closed')
          AND ($1::TEXT IS NULL OR title ILIKE $1 OR description ILIKE $1)
          AND ($2::TEXT IS NULL OR category = $2)
          AND ($3::opportunity_type IS NULL OR opportunity_type = $3)
          AND ($4::work_mode IS NULL OR mode = $4)
        "#,
    )
    .bind(&search_pattern)
    .bind(&params.category)
    .bind(params.opportunity_type)
    .bind(params.mode)
    .fetch_one(&pool)
    .await?;

    let query = format!(
        r#"
        SELECT * FROM opportunities
        WHERE status IN ('published', 'closed')
          AND ($1::TEXT IS NULL OR title ILIKE $1 OR description ILIKE $1)
          AND ($2::TEXT IS NULL OR category = $2)
          AND ($3::opportunity_type IS NULL OR opportunity_type = $3)
          AND ($4::work_mode IS NULL OR mode = $4)
        ORDER BY {}
        LIMIT $5 OFFSET $6
        "#,
        params.order_clause()
    );

    let opportunities = sqlx::query_as::<_, Opportunity>(&query)
        .bind(&search_pattern)
        .bind(&params.category)
        .bind(params.opportunity_type)
        .bind(params.mode)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&pool)
        .await?;

    Ok(Json(OpportunityListResponse {
        opportunities,
        total,
    }))
}

/// List one recruiter's postings. The owner sees every status and may filter
/// on any; anyone else is restricted to published/closed, and asking for
/// draft or archived as a non-owner yields an empty page instead of an error.
pub async fn list_by_recruiter(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(recruiter_id): Path<i64>,
    Query(params): Query<RecruiterListParams>,
) -> Result<impl IntoResponse, AppError> {
    let is_owner = claims.user_id() == recruiter_id;

    if !is_owner
        && matches!(
            params.status,
            Some(OpportunityStatus::Draft) | Some(OpportunityStatus::Archived)
        )
    {
        return Ok(Json(OpportunityListResponse {
            opportunities: vec![],
            total: 0,
        }));
    }

    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM opportunities
        WHERE recruiter_id = $1
          AND ($2::opportunity_status IS NULL OR status = $2)
          AND ($3 OR status IN ('published', 'closed'))
        "#,
    )
    .bind(recruiter_id)
    .bind(params.status)
    .bind(is_owner)
    .fetch_one(&pool)
    .await?;

    let opportunities = sqlx::query_as::<_, Opportunity>(
        r#"
        SELECT * FROM opportunities
        WHERE recruiter_id = $1
          AND ($2::opportunity_status IS NULL OR status = $2)
          AND ($3 OR status IN ('published', 'closed'))
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(recruiter_id)
    .bind(params.status)
    .bind(is_owner)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(OpportunityListResponse {
        opportunities,
        total,
    }))
}

/// Move an opportunity to any status. Only the owning recruiter; no
/// transition table restricts the change.
pub async fn update_opportunity_status(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateOpportunityStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let existing = sqlx::query_as::<_, Opportunity>("SELECT * FROM opportunities WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Opportunity not found".to_string()))?;

    if existing.recruiter_id != claims.user_id() {
        return Err(AppError::Forbidden(
            "You do not have permission to update this opportunity".to_string(),
        ));
    }

    let opportunity = sqlx::query_as::<_, Opportunity>(
        "UPDATE opportunities SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(payload.status)
    .bind(id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update opportunity status: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(opportunity))
}
