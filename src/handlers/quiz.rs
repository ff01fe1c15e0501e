// src/handlers/quiz.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        quiz::{
            AttemptBundle, AttemptResultResponse, CreateQuizRequest, PublicQuizQuestion, Quiz,
            QuizAnswer, QuizAttempt, QuizQuestion, QuizWithQuestions, SubmitAttemptRequest,
            SubmittedAnswer, UpdateQuizRequest,
        },
        user::Role,
    },
    utils::{html::clean_html, jwt::Claims},
};

/// A graded answer, ready to be persisted.
struct GradedAnswer {
    question_id: i64,
    selected_answer: String,
    is_correct: bool,
}

/// Grades a submission against the answer key.
///
/// Totals accumulate over the submitted answers that match a known question;
/// answers referencing unknown question ids are dropped without error and
/// contribute to nothing. Score is round(earned / total * 100), or 0 when no
/// valid answer was submitted.
fn grade_submission(
    answers: &[SubmittedAnswer],
    key: &HashMap<i64, (String, i32)>,
) -> (i32, Vec<GradedAnswer>) {
    let mut total_points = 0;
    let mut earned_points = 0;
    let mut graded = Vec::with_capacity(answers.len());

    for answer in answers {
        let Some((correct_answer, points)) = key.get(&answer.question_id) else {
            continue;
        };
        total_points += points;
        let is_correct = answer.selected_answer == *correct_answer;
        if is_correct {
            earned_points += points;
        }
        graded.push(GradedAnswer {
            question_id: answer.question_id,
            selected_answer: answer.selected_answer.clone(),
            is_correct,
        });
    }

    let score = if total_points == 0 {
        0
    } else {
        ((earned_points as f64 / total_points as f64) * 100.0).round() as i32
    };

    (score, graded)
}

/// Author a quiz for an opportunity, questions included. Recruiter only, must
/// own the opportunity, and an opportunity can carry at most one quiz. Quiz
/// and questions are inserted in one transaction; question order is the index
/// in the submitted list.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let recruiter_id =
        sqlx::query_scalar::<_, i64>("SELECT recruiter_id FROM opportunities WHERE id = $1")
            .bind(payload.opportunity_id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound("Opportunity not found".to_string()))?;

    if recruiter_id != claims.user_id() {
        return Err(AppError::Forbidden("Not your opportunity".to_string()));
    }

    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM quizzes WHERE opportunity_id = $1")
        .bind(payload.opportunity_id)
        .fetch_optional(&pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict(
            "Quiz already exists for this opportunity".to_string(),
        ));
    }

    let description = payload.description.as_deref().map(clean_html);

    let mut tx = pool.begin().await?;

    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        INSERT INTO quizzes (opportunity_id, title, description, duration_minutes, passing_score)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(payload.opportunity_id)
    .bind(payload.title)
    .bind(description)
    .bind(payload.duration_minutes)
    .bind(payload.passing_score)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        let msg = e.to_string();
        if msg.contains("unique constraint") || msg.contains("23505") {
            AppError::Conflict("Quiz already exists for this opportunity".to_string())
        } else {
            tracing::error!("Failed to create quiz: {:?}", e);
            AppError::InternalServerError(msg)
        }
    })?;

    let mut questions = Vec::with_capacity(payload.questions.len());
    for (index, question) in payload.questions.into_iter().enumerate() {
        let inserted = sqlx::query_as::<_, QuizQuestion>(
            r#"
            INSERT INTO quiz_questions
            (quiz_id, question_text, options, correct_answer, points, question_order)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(quiz.id)
        .bind(question.question_text)
        .bind(SqlJson(question.options))
        .bind(question.correct_answer)
        .bind(question.points.unwrap_or(1))
        .bind(index as i32)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create quiz question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
        questions.push(inserted);
    }

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(QuizWithQuestions { quiz, questions })))
}

/// Edit quiz settings. Ownership resolves transitively through the quiz's
/// opportunity. Questions are not touched by this operation.
pub async fn update_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    let recruiter_id =
        sqlx::query_scalar::<_, i64>("SELECT recruiter_id FROM opportunities WHERE id = $1")
            .bind(quiz.opportunity_id)
            .fetch_optional(&pool)
            .await?;

    if recruiter_id != Some(claims.user_id()) {
        return Err(AppError::Forbidden("Not your quiz".to_string()));
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE quizzes SET updated_at = NOW()");

    if let Some(title) = payload.title {
        builder.push(", title = ");
        builder.push_bind(title);
    }
    if let Some(description) = payload.description {
        builder.push(", description = ");
        builder.push_bind(clean_html(&description));
    }
    if let Some(duration_minutes) = payload.duration_minutes {
        builder.push(", duration_minutes = ");
        builder.push_bind(duration_minutes);
    }
    if let Some(passing_score) = payload.passing_score {
        builder.push(", passing_score = ");
        builder.push_bind(passing_score);
    }
    if let Some(is_active) = payload.is_active {
        builder.push(", is_active = ");
        builder.push_bind(is_active);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");

    let quiz: Quiz = builder.build_query_as().fetch_one(&pool).await.map_err(|e| {
        tracing::error!("Failed to update quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(quiz))
}

/// Review a quiz with its full answer key. Restricted to the recruiter owning
/// the quiz's opportunity, or an admin; the caller is not trusted to gate
/// this themselves.
pub async fn get_by_opportunity(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(opportunity_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE opportunity_id = $1")
        .bind(opportunity_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    match claims.role {
        Role::Admin => {}
        Role::Recruiter => {
            let recruiter_id =
                sqlx::query_scalar::<_, i64>("SELECT recruiter_id FROM opportunities WHERE id = $1")
                    .bind(quiz.opportunity_id)
                    .fetch_optional(&pool)
                    .await?;

            if recruiter_id != Some(claims.user_id()) {
                return Err(AppError::Forbidden("Not your quiz".to_string()));
            }
        }
        Role::Candidate => {
            return Err(AppError::Forbidden("Not your quiz".to_string()));
        }
    }

    let questions = sqlx::query_as::<_, QuizQuestion>(
        "SELECT * FROM quiz_questions WHERE quiz_id = $1 ORDER BY question_order",
    )
    .bind(quiz.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(QuizWithQuestions { quiz, questions }))
}

/// Open (or resume) an attempt on a quiz. Candidate only; the quiz must be
/// active. The first call creates the attempt, later calls return the same
/// row, submitted or not. Questions are sent without their correct answers.
/// The unique constraint on (quiz_id, candidate_id) makes the create-or-reuse
/// sequence safe under concurrent requests.
pub async fn get_for_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1")
        .bind(quiz_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if !quiz.is_active {
        return Err(AppError::BadRequest("Quiz is not active".to_string()));
    }

    let candidate_id = claims.user_id();

    sqlx::query(
        r#"
        INSERT INTO quiz_attempts (quiz_id, candidate_id)
        VALUES ($1, $2)
        ON CONFLICT (quiz_id, candidate_id) DO NOTHING
        "#,
    )
    .bind(quiz_id)
    .bind(candidate_id)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz attempt: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let attempt = sqlx::query_as::<_, QuizAttempt>(
        "SELECT * FROM quiz_attempts WHERE quiz_id = $1 AND candidate_id = $2",
    )
    .bind(quiz_id)
    .bind(candidate_id)
    .fetch_one(&pool)
    .await?;

    let questions = sqlx::query_as::<_, QuizQuestion>(
        "SELECT * FROM quiz_questions WHERE quiz_id = $1 ORDER BY question_order",
    )
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    let questions: Vec<PublicQuizQuestion> =
        questions.into_iter().map(PublicQuizQuestion::from).collect();

    Ok(Json(AttemptBundle {
        quiz,
        questions,
        attempt,
    }))
}

/// Submit an attempt for grading. Single-shot: a submitted attempt rejects
/// further submissions, and the finalizing UPDATE is conditional on
/// `submitted_at IS NULL` so two racing submissions cannot both land. Answer
/// rows are written in the same transaction as the finalization.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = sqlx::query_as::<_, QuizAttempt>("SELECT * FROM quiz_attempts WHERE id = $1")
        .bind(attempt_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.candidate_id != claims.user_id() {
        return Err(AppError::Forbidden("Not your attempt".to_string()));
    }

    if attempt.submitted_at.is_some() {
        return Err(AppError::BadRequest("Quiz already submitted".to_string()));
    }

    let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1")
        .bind(attempt.quiz_id)
        .fetch_one(&pool)
        .await?;

    let questions = sqlx::query_as::<_, QuizQuestion>(
        "SELECT * FROM quiz_questions WHERE quiz_id = $1",
    )
    .bind(attempt.quiz_id)
    .fetch_all(&pool)
    .await?;

    let key: HashMap<i64, (String, i32)> = questions
        .into_iter()
        .map(|q| (q.id, (q.correct_answer, q.points)))
        .collect();

    let (score, graded) = grade_submission(&payload.answers, &key);
    let passed = score >= quiz.passing_score;

    let mut tx = pool.begin().await?;

    let finalized = sqlx::query(
        r#"
        UPDATE quiz_attempts SET score = $1, passed = $2, submitted_at = NOW()
        WHERE id = $3 AND submitted_at IS NULL
        "#,
    )
    .bind(score)
    .bind(passed)
    .bind(attempt_id)
    .execute(&mut *tx)
    .await?;

    if finalized.rows_affected() == 0 {
        // Lost a race against another submission of the same attempt.
        return Err(AppError::BadRequest("Quiz already submitted".to_string()));
    }

    for answer in &graded {
        sqlx::query(
            r#"
            INSERT INTO quiz_answers (attempt_id, question_id, selected_answer, is_correct)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(attempt_id)
        .bind(answer.question_id)
        .bind(&answer.selected_answer)
        .bind(answer.is_correct)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to persist quiz answer: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
    }

    tx.commit().await?;

    let attempt = sqlx::query_as::<_, QuizAttempt>("SELECT * FROM quiz_attempts WHERE id = $1")
        .bind(attempt_id)
        .fetch_one(&pool)
        .await?;

    Ok(Json(attempt))
}

/// Record one tab switch on the caller's open attempt. Proctoring signal
/// only; submitted attempts are immutable.
pub async fn record_tab_switch(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = sqlx::query_as::<_, QuizAttempt>("SELECT * FROM quiz_attempts WHERE id = $1")
        .bind(attempt_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.candidate_id != claims.user_id() {
        return Err(AppError::Forbidden("Not your attempt".to_string()));
    }

    if attempt.submitted_at.is_some() {
        return Err(AppError::BadRequest("Quiz already submitted".to_string()));
    }

    let attempt = sqlx::query_as::<_, QuizAttempt>(
        r#"
        UPDATE quiz_attempts SET tab_switch_count = tab_switch_count + 1
        WHERE id = $1 AND submitted_at IS NULL
        RETURNING *
        "#,
    )
    .bind(attempt_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::BadRequest("Quiz already submitted".to_string()))?;

    Ok(Json(attempt))
}

/// Review a graded attempt: attempt, persisted answers and the questions with
/// their correct answers. Candidates see their own attempts, recruiters the
/// attempts on quizzes whose opportunity they own, admins any. The role match
/// is exhaustive; nothing falls through.
pub async fn get_attempt_result(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = sqlx::query_as::<_, QuizAttempt>("SELECT * FROM quiz_attempts WHERE id = $1")
        .bind(attempt_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    match claims.role {
        Role::Candidate => {
            if attempt.candidate_id != claims.user_id() {
                return Err(AppError::Forbidden(
                    "You do not have permission to view this attempt".to_string(),
                ));
            }
        }
        Role::Recruiter => {
            let recruiter_id = sqlx::query_scalar::<_, i64>(
                r#"
                SELECT o.recruiter_id
                FROM quizzes q
                JOIN opportunities o ON q.opportunity_id = o.id
                WHERE q.id = $1
                "#,
            )
            .bind(attempt.quiz_id)
            .fetch_optional(&pool)
            .await?;

            if recruiter_id != Some(claims.user_id()) {
                return Err(AppError::Forbidden(
                    "You do not have permission to view this attempt".to_string(),
                ));
            }
        }
        Role::Admin => {}
    }

    let answers = sqlx::query_as::<_, QuizAnswer>(
        "SELECT * FROM quiz_answers WHERE attempt_id = $1 ORDER BY id",
    )
    .bind(attempt_id)
    .fetch_all(&pool)
    .await?;

    let questions = sqlx::query_as::<_, QuizQuestion>(
        "SELECT * FROM quiz_questions WHERE quiz_id = $1 ORDER BY question_order",
    )
    .bind(attempt.quiz_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(AttemptResultResponse {
        attempt,
        answers,
        questions,
    }))
}
