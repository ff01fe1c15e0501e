// tests/quiz_tests.rs

use internlink::{
    config::Config, models::user::Role, routes, state::AppState, utils::jwt::sign_jwt,
};
use sqlx::{PgPool, postgres::PgPoolOptions};

const TEST_SECRET: &str = "quiz_test_secret";

async fn spawn_app() -> String {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: TEST_SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
    };

    let state = AppState { pool, config };
    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

async fn test_pool() -> PgPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test DB")
}

async fn seed_user(pool: &PgPool, role: Role) -> (i64, String) {
    let email = format!("{}@users.test", uuid::Uuid::new_v4());
    let name = format!("user_{}", &uuid::Uuid::new_v4().to_string()[..8]);

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (email, name, role) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&email)
    .bind(&name)
    .bind(role.as_str())
    .fetch_one(pool)
    .await
    .unwrap();

    let token = sign_jwt(id, role, TEST_SECRET, 600).unwrap();
    (id, token)
}

/// Creates and publishes an opportunity, returning its id.
async fn seed_published_opportunity(
    client: &reqwest::Client,
    address: &str,
    recruiter_token: &str,
) -> i64 {
    let resp = client
        .post(format!("{}/api/opportunities", address))
        .header("Authorization", format!("Bearer {}", recruiter_token))
        .json(&serde_json::json!({
            "title": "Quizzed internship",
            "description": "Backend work, assessment required.",
            "type": "internship",
            "mode": "remote",
            "category": "assessments",
            "skills": ["rust"],
            "positions": 1,
            "deadline": (chrono::Utc::now() + chrono::Duration::days(30)).to_rfc3339(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let id = resp.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    let resp = client
        .put(format!("{}/api/opportunities/{}/status", address, id))
        .header("Authorization", format!("Bearer {}", recruiter_token))
        .json(&serde_json::json!({"status": "published"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    id
}

fn two_question_quiz(opportunity_id: i64) -> serde_json::Value {
    serde_json::json!({
        "opportunity_id": opportunity_id,
        "title": "Backend screening quiz",
        "duration_minutes": 30,
        "passing_score": 70,
        "questions": [
            {
                "question_text": "Which keyword declares an immutable binding?",
                "options": [
                    {"label": "let", "value": "let"},
                    {"label": "mut", "value": "mut"},
                ],
                "correct_answer": "let",
            },
            {
                "question_text": "Which trait enables the ? operator conversion?",
                "options": [
                    {"label": "From", "value": "from"},
                    {"label": "Clone", "value": "clone"},
                ],
                "correct_answer": "from",
            },
        ],
    })
}

/// Creates a quiz and returns (quiz_id, question_ids in presentation order).
async fn seed_quiz(
    client: &reqwest::Client,
    address: &str,
    recruiter_token: &str,
    opportunity_id: i64,
) -> (i64, Vec<i64>) {
    let resp = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", format!("Bearer {}", recruiter_token))
        .json(&two_question_quiz(opportunity_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    let quiz_id = body["quiz"]["id"].as_i64().unwrap();
    let question_ids = body["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["id"].as_i64().unwrap())
        .collect();
    (quiz_id, question_ids)
}

/// Opens an attempt for the candidate and returns the attempt id.
async fn open_attempt(
    client: &reqwest::Client,
    address: &str,
    candidate_token: &str,
    quiz_id: i64,
) -> i64 {
    let resp = client
        .post(format!("{}/api/quizzes/{}/attempt", address, quiz_id))
        .header("Authorization", format!("Bearer {}", candidate_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["attempt"]["id"].as_i64().unwrap()
}

async fn submit(
    client: &reqwest::Client,
    address: &str,
    candidate_token: &str,
    attempt_id: i64,
    answers: serde_json::Value,
) -> reqwest::Response {
    client
        .post(format!(
            "{}/api/quizzes/attempts/{}/submit",
            address, attempt_id
        ))
        .header("Authorization", format!("Bearer {}", candidate_token))
        .json(&serde_json::json!({"answers": answers}))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn one_quiz_per_opportunity() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (_, recruiter) = seed_user(&pool, Role::Recruiter).await;
    let opp_id = seed_published_opportunity(&client, &address, &recruiter).await;

    seed_quiz(&client, &address, &recruiter, opp_id).await;

    let resp = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", format!("Bearer {}", recruiter))
        .json(&two_question_quiz(opp_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "CONFLICT");
    assert_eq!(body["error"], "Quiz already exists for this opportunity");
}

#[tokio::test]
async fn quiz_authoring_requires_opportunity_ownership() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (_, recruiter) = seed_user(&pool, Role::Recruiter).await;
    let (_, other) = seed_user(&pool, Role::Recruiter).await;
    let opp_id = seed_published_opportunity(&client, &address, &recruiter).await;

    let resp = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", format!("Bearer {}", other))
        .json(&two_question_quiz(opp_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Not your opportunity");

    let resp = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", format!("Bearer {}", recruiter))
        .json(&two_question_quiz(99999999))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn attempt_is_created_lazily_and_reused() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (_, recruiter) = seed_user(&pool, Role::Recruiter).await;
    let (_, candidate) = seed_user(&pool, Role::Candidate).await;
    let opp_id = seed_published_opportunity(&client, &address, &recruiter).await;
    let (quiz_id, _) = seed_quiz(&client, &address, &recruiter, opp_id).await;

    let resp = client
        .post(format!("{}/api/quizzes/{}/attempt", address, quiz_id))
        .header("Authorization", format!("Bearer {}", candidate))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let attempt_id = body["attempt"]["id"].as_i64().unwrap();
    assert_eq!(body["attempt"]["tab_switch_count"], 0);
    assert!(body["attempt"]["submitted_at"].is_null());

    // Candidates never receive correct answers before submission.
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    for question in questions {
        assert!(question.get("correct_answer").is_none());
    }
    // Presentation order is the authoring order.
    assert_eq!(questions[0]["order"], 0);
    assert_eq!(questions[1]["order"], 1);

    // A second call resumes the same attempt.
    let second = open_attempt(&client, &address, &candidate, quiz_id).await;
    assert_eq!(second, attempt_id);
}

#[tokio::test]
async fn inactive_quiz_rejects_attempts() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (_, recruiter) = seed_user(&pool, Role::Recruiter).await;
    let (_, candidate) = seed_user(&pool, Role::Candidate).await;
    let opp_id = seed_published_opportunity(&client, &address, &recruiter).await;
    let (quiz_id, _) = seed_quiz(&client, &address, &recruiter, opp_id).await;

    let resp = client
        .put(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", recruiter))
        .json(&serde_json::json!({"is_active": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = client
        .post(format!("{}/api/quizzes/{}/attempt", address, quiz_id))
        .header("Authorization", format!("Bearer {}", candidate))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Quiz is not active");
}

#[tokio::test]
async fn grading_is_deterministic() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (_, recruiter) = seed_user(&pool, Role::Recruiter).await;
    let opp_id = seed_published_opportunity(&client, &address, &recruiter).await;
    let (quiz_id, question_ids) = seed_quiz(&client, &address, &recruiter, opp_id).await;

    // One correct, one incorrect: 50, below the 70 passing score.
    let (_, half_right) = seed_user(&pool, Role::Candidate).await;
    let attempt = open_attempt(&client, &address, &half_right, quiz_id).await;
    let resp = submit(
        &client,
        &address,
        &half_right,
        attempt,
        serde_json::json!([
            {"question_id": question_ids[0], "selected_answer": "let"},
            {"question_id": question_ids[1], "selected_answer": "clone"},
        ]),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["score"], 50);
    assert_eq!(body["passed"], false);

    // Both correct: 100, passed.
    let (_, all_right) = seed_user(&pool, Role::Candidate).await;
    let attempt = open_attempt(&client, &address, &all_right, quiz_id).await;
    let resp = submit(
        &client,
        &address,
        &all_right,
        attempt,
        serde_json::json!([
            {"question_id": question_ids[0], "selected_answer": "let"},
            {"question_id": question_ids[1], "selected_answer": "from"},
        ]),
    )
    .await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["score"], 100);
    assert_eq!(body["passed"], true);

    // Unknown question ids are dropped silently; nothing valid scores zero.
    let (_, lost) = seed_user(&pool, Role::Candidate).await;
    let attempt = open_attempt(&client, &address, &lost, quiz_id).await;
    let resp = submit(
        &client,
        &address,
        &lost,
        attempt,
        serde_json::json!([
            {"question_id": 99999998, "selected_answer": "let"},
            {"question_id": 99999999, "selected_answer": "from"},
        ]),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["score"], 0);
    assert_eq!(body["passed"], false);
}

#[tokio::test]
async fn submission_is_single_shot() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (_, recruiter) = seed_user(&pool, Role::Recruiter).await;
    let (_, candidate) = seed_user(&pool, Role::Candidate).await;
    let opp_id = seed_published_opportunity(&client, &address, &recruiter).await;
    let (quiz_id, question_ids) = seed_quiz(&client, &address, &recruiter, opp_id).await;

    let attempt = open_attempt(&client, &address, &candidate, quiz_id).await;
    let first = submit(
        &client,
        &address,
        &candidate,
        attempt,
        serde_json::json!([
            {"question_id": question_ids[0], "selected_answer": "let"},
        ]),
    )
    .await;
    assert_eq!(first.status().as_u16(), 200);
    let graded: serde_json::Value = first.json().await.unwrap();
    assert_eq!(graded["score"], 100);

    // A second submission changes nothing.
    let second = submit(
        &client,
        &address,
        &candidate,
        attempt,
        serde_json::json!([
            {"question_id": question_ids[0], "selected_answer": "mut"},
            {"question_id": question_ids[1], "selected_answer": "clone"},
        ]),
    )
    .await;
    assert_eq!(second.status().as_u16(), 400);
    let body: serde_json::Value = second.json().await.unwrap();
    assert_eq!(body["error"], "Quiz already submitted");

    let resp = client
        .get(format!("{}/api/quizzes/attempts/{}", address, attempt))
        .header("Authorization", format!("Bearer {}", candidate))
        .send()
        .await
        .unwrap();
    let result: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(result["attempt"]["score"], 100);
    assert_eq!(result["answers"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn tab_switches_count_until_submission() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (_, recruiter) = seed_user(&pool, Role::Recruiter).await;
    let (_, candidate) = seed_user(&pool, Role::Candidate).await;
    let (_, other) = seed_user(&pool, Role::Candidate).await;
    let opp_id = seed_published_opportunity(&client, &address, &recruiter).await;
    let (quiz_id, question_ids) = seed_quiz(&client, &address, &recruiter, opp_id).await;

    let attempt = open_attempt(&client, &address, &candidate, quiz_id).await;
    let url = format!("{}/api/quizzes/attempts/{}/tab-switch", address, attempt);

    for expected in 1..=2 {
        let resp = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", candidate))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["tab_switch_count"], expected);
    }

    // Someone else's attempt is off limits.
    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", other))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Not your attempt");

    // Submitted attempts are immutable.
    submit(
        &client,
        &address,
        &candidate,
        attempt,
        serde_json::json!([
            {"question_id": question_ids[0], "selected_answer": "let"},
        ]),
    )
    .await;

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", candidate))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn attempt_results_respect_roles() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (_, recruiter) = seed_user(&pool, Role::Recruiter).await;
    let (_, other_recruiter) = seed_user(&pool, Role::Recruiter).await;
    let (_, candidate) = seed_user(&pool, Role::Candidate).await;
    let (_, other_candidate) = seed_user(&pool, Role::Candidate).await;
    let (_, admin) = seed_user(&pool, Role::Admin).await;

    let opp_id = seed_published_opportunity(&client, &address, &recruiter).await;
    let (quiz_id, question_ids) = seed_quiz(&client, &address, &recruiter, opp_id).await;

    let attempt = open_attempt(&client, &address, &candidate, quiz_id).await;
    submit(
        &client,
        &address,
        &candidate,
        attempt,
        serde_json::json!([
            {"question_id": question_ids[0], "selected_answer": "let"},
            {"question_id": question_ids[1], "selected_answer": "clone"},
        ]),
    )
    .await;

    let url = format!("{}/api/quizzes/attempts/{}", address, attempt);

    // Own candidate, owning recruiter and admin may review; answers and the
    // full questions (correct answers included) come back.
    for token in [&candidate, &recruiter, &admin] {
        let resp = client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["answers"].as_array().unwrap().len(), 2);
        assert!(body["questions"][0].get("correct_answer").is_some());
    }

    for token in [&other_candidate, &other_recruiter] {
        let resp = client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 403);
    }

    let resp = client
        .get(format!("{}/api/quizzes/attempts/99999999", address))
        .header("Authorization", format!("Bearer {}", candidate))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn answer_key_review_is_owner_only() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (_, recruiter) = seed_user(&pool, Role::Recruiter).await;
    let (_, other_recruiter) = seed_user(&pool, Role::Recruiter).await;
    let (_, candidate) = seed_user(&pool, Role::Candidate).await;
    let (_, admin) = seed_user(&pool, Role::Admin).await;

    let opp_id = seed_published_opportunity(&client, &address, &recruiter).await;
    seed_quiz(&client, &address, &recruiter, opp_id).await;

    let url = format!("{}/api/quizzes/opportunity/{}", address, opp_id);

    for token in [&recruiter, &admin] {
        let resp = client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["questions"][0]["correct_answer"], "let");
    }

    for token in [&other_recruiter, &candidate] {
        let resp = client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 403);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Not your quiz");
    }
}

#[tokio::test]
async fn quiz_settings_update_is_transitively_owned() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let pool = test_pool().await;

    let (_, recruiter) = seed_user(&pool, Role::Recruiter).await;
    let (_, other_recruiter) = seed_user(&pool, Role::Recruiter).await;

    let opp_id = seed_published_opportunity(&client, &address, &recruiter).await;
    let (quiz_id, _) = seed_quiz(&client, &address, &recruiter, opp_id).await;

    let resp = client
        .put(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", other_recruiter))
        .json(&serde_json::json!({"passing_score": 10}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Not your quiz");

    let resp = client
        .put(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", recruiter))
        .json(&serde_json::json!({"passing_score": 90, "duration_minutes": 45}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["passing_score"], 90);
    assert_eq!(body["duration_minutes"], 45);

    // Validation still applies to partial updates.
    let resp = client
        .put(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", recruiter))
        .json(&serde_json::json!({"passing_score": 150}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}
