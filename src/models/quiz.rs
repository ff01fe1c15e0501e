// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

/// Represents the 'quizzes' table in the database.
/// At most one quiz per opportunity, enforced by a unique constraint.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub opportunity_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,

    /// Minimum score (0-100) an attempt needs to pass.
    pub passing_score: i32,
    pub is_active: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// One selectable option of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub label: String,
    pub value: String,
}

/// Represents the 'quiz_questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,
    pub quiz_id: i64,
    pub question_text: String,

    /// Stored as a JSON array in the database; presentation order matters.
    pub options: Json<Vec<AnswerOption>>,

    /// Never serialized toward candidates before submission; see
    /// [`PublicQuizQuestion`].
    pub correct_answer: String,

    pub points: i32,

    /// Zero-based creation index; determines presentation order.
    #[serde(rename = "order")]
    pub question_order: i32,
}

/// DTO for sending a question to a candidate taking the quiz.
/// Excludes the correct answer.
#[derive(Debug, Serialize)]
pub struct PublicQuizQuestion {
    pub id: i64,
    pub question_text: String,
    pub options: Json<Vec<AnswerOption>>,
    pub points: i32,
    #[serde(rename = "order")]
    pub question_order: i32,
}

impl From<QuizQuestion> for PublicQuizQuestion {
    fn from(question: QuizQuestion) -> Self {
        Self {
            id: question.id,
            question_text: question.question_text,
            options: question.options,
            points: question.points,
            question_order: question.question_order,
        }
    }
}

/// Represents the 'quiz_attempts' table in the database.
/// At most one per (quiz, candidate) pair; immutable once submitted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub quiz_id: i64,
    pub candidate_id: i64,
    pub score: Option<i32>,
    pub passed: Option<bool>,

    /// Proctoring signal; incremented while the attempt is open.
    pub tab_switch_count: i32,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'quiz_answers' table in the database.
/// Written in bulk at submission time. `is_correct` is fixed at grading time;
/// the question's correct answer may change afterwards.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_answer: String,
    pub is_correct: bool,
}

/// DTO for authoring one question at quiz creation time.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateQuizQuestionRequest {
    #[validate(length(
        min = 1,
        max = 2000,
        message = "Question text length must be between 1 and 2000 characters."
    ))]
    pub question_text: String,

    #[validate(custom(function = validate_options))]
    pub options: Vec<AnswerOption>,

    #[validate(length(min = 1, max = 500))]
    pub correct_answer: String,

    /// Defaults to 1 if unspecified.
    #[validate(range(min = 1))]
    pub points: Option<i32>,
}

/// DTO for creating a quiz together with its questions.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    pub opportunity_id: i64,

    #[validate(length(
        min = 5,
        max = 200,
        message = "Title length must be between 5 and 200 characters."
    ))]
    pub title: String,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(range(min = 1, message = "Duration must be at least 1 minute."))]
    pub duration_minutes: i32,

    #[validate(range(min = 0, max = 100, message = "Passing score must be between 0 and 100."))]
    pub passing_score: i32,

    #[validate(length(min = 1, message = "A quiz needs at least one question."), nested)]
    pub questions: Vec<CreateQuizQuestionRequest>,
}

/// DTO for editing quiz settings. Questions are not mutated through this.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 5, max = 200))]
    pub title: Option<String>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(range(min = 1))]
    pub duration_minutes: Option<i32>,

    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,

    pub is_active: Option<bool>,
}

/// One answer in a submission payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub selected_answer: String,
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    pub answers: Vec<SubmittedAnswer>,
}

/// Quiz plus its full question set, correct answers included. Only ever sent
/// to the owning recruiter (or an admin).
#[derive(Debug, Serialize)]
pub struct QuizWithQuestions {
    pub quiz: Quiz,
    pub questions: Vec<QuizQuestion>,
}

/// What a candidate receives when opening (or resuming) an attempt.
#[derive(Debug, Serialize)]
pub struct AttemptBundle {
    pub quiz: Quiz,
    pub questions: Vec<PublicQuizQuestion>,
    pub attempt: QuizAttempt,
}

/// A posteriori review of a graded attempt; correct answers are exposed here.
#[derive(Debug, Serialize)]
pub struct AttemptResultResponse {
    pub attempt: QuizAttempt,
    pub answers: Vec<QuizAnswer>,
    pub questions: Vec<QuizQuestion>,
}

pub fn validate_options(options: &Vec<AnswerOption>) -> Result<(), validator::ValidationError> {
    if options.is_empty() {
        return Err(validator::ValidationError::new("options_cannot_be_empty"));
    }
    for option in options {
        if option.label.is_empty() || option.label.len() > 500 {
            return Err(validator::ValidationError::new("option_label_length"));
        }
        if option.value.is_empty() || option.value.len() > 500 {
            return Err(validator::ValidationError::new("option_value_length"));
        }
    }
    Ok(())
}
