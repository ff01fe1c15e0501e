// src/handlers/profile.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{PublicProfile, UpdateProfileRequest, User},
    utils::{html::clean_html, jwt::Claims},
};

/// Get the caller's own full profile, contact details included.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(claims.user_id())
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Update the caller's own profile. Only defined fields are written.
pub async fn update_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE users SET updated_at = NOW()");

    if let Some(name) = payload.name {
        builder.push(", name = ");
        builder.push_bind(name);
    }
    if let Some(phone) = payload.phone {
        builder.push(", phone = ");
        builder.push_bind(phone);
    }
    if let Some(bio) = payload.bio {
        builder.push(", bio = ");
        builder.push_bind(clean_html(&bio));
    }
    if let Some(location) = payload.location {
        builder.push(", location = ");
        builder.push_bind(location);
    }
    if let Some(skills) = payload.skills {
        builder.push(", skills = ");
        builder.push_bind(SqlJson(skills));
    }
    if let Some(resume_url) = payload.resume_url {
        builder.push(", resume_url = ");
        builder.push_bind(resume_url);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(claims.user_id());
    builder.push(" RETURNING *");

    let user: User = builder.build_query_as().fetch_one(&pool).await.map_err(|e| {
        tracing::error!("Failed to update profile: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(user))
}

/// Public projection of any user's profile. Email, phone, resume location and
/// ban status never leave through this route.
pub async fn get_public_profile(
    State(pool): State<PgPool>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let profile = sqlx::query_as::<_, PublicProfile>(
        "SELECT id, name, role, bio, location, skills, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(profile))
}
